//! Walking an address range through page lookup and DRAM decoding.

use anyhow::{Context, bail};
use dramloc_core::decode::{DecodeError, DramDecoder};
use dramloc_core::memory::{PageMapError, VirtToPhysResolver};
use dramloc_core::pci::RegisterAccessor;
use dramloc_core::report::TranslationRecord;
use log::warn;

/// The addresses `start, start + step, ...` below `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    start: u64,
    end: u64,
    step: u64,
}

impl AddressRange {
    /// Range covering `len` bytes from `start`, one address every `step` bytes.
    ///
    /// The end saturates at `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is zero.
    pub fn new(start: u64, len: u64, step: u64) -> anyhow::Result<Self> {
        if step == 0 {
            bail!("step must be greater than zero");
        }
        Ok(AddressRange {
            start,
            end: start.saturating_add(len),
            step,
        })
    }

    /// Number of addresses in the range.
    pub fn len(&self) -> u64 {
        (self.end - self.start).div_ceil(self.step)
    }

    /// Returns `true` if the range holds no address.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Iterates over the addresses in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + use<> {
        let AddressRange { start, end, step } = *self;
        std::iter::successors(Some(start).filter(|&a| a < end), move |&a| {
            a.checked_add(step).filter(|&next| next < end)
        })
    }
}

/// Outcome of a range walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Records emitted
    pub addresses: u64,
    /// Records whose physical address could not be decoded
    pub undecodable: u64,
}

/// Translates every address of `range` and hands one record per address to `emit`.
///
/// Without a `pagemap` the addresses are physical. Without a `decoder` no DRAM address is
/// decoded. An address that no node, rank or address map accepts is logged and emitted
/// without DRAM fields; the walk goes on.
///
/// # Errors
///
/// Fails on the first page lookup error, register read error or error returned by `emit`.
pub fn walk_range<P, R, F>(
    range: &AddressRange,
    mut pagemap: Option<&mut P>,
    mut decoder: Option<&mut DramDecoder<R>>,
    mut emit: F,
) -> anyhow::Result<WalkSummary>
where
    P: VirtToPhysResolver<Error = PageMapError>,
    R: RegisterAccessor,
    F: FnMut(TranslationRecord) -> anyhow::Result<()>,
{
    let mut summary = WalkSummary::default();
    for addr in range.iter() {
        let record = match pagemap.as_deref_mut() {
            Some(pagemap) => {
                let (phys, page) = pagemap
                    .translate(addr)
                    .with_context(|| format!("Error translating virtual address {:#x}", addr))?;
                TranslationRecord::virtual_to_physical(addr, phys.as_u64(), page)
            }
            None => TranslationRecord::physical(addr),
        };
        let phys = record.physical_addr;
        let record = match decoder.as_deref_mut().map(|d| d.translate(phys)) {
            Some(Ok(translation)) => record.with_translation(&translation),
            Some(Err(e @ DecodeError::RegisterRead { .. })) => {
                return Err(e)
                    .with_context(|| format!("Error translating physical address {:#x}", phys));
            }
            Some(Err(e)) => {
                warn!("Cannot decode physical address {:#x}: {}", phys, e);
                summary.undecodable += 1;
                record
            }
            None => record,
        };
        summary.addresses += 1;
        emit(record)?;
    }
    Ok(summary)
}

//! Composition of the three decoding stages.

use log::info;

use super::error::DecodeError;
use super::geometry::decode_geometry;
use super::node::resolve_node;
use super::rank::resolve_rank;
use crate::memory::DramAddr;
use crate::pci::{PciDevice, RegisterAccessor};

/// A decoded address together with the intermediate addresses of each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    /// Physical address after the interleaved region swap
    pub physical: u64,
    /// Normalized DCT address
    pub normalized: u64,
    /// Address within the rank
    pub rank_addr: u64,
    /// The owning rank has been replaced by the online spare
    pub spare_in_use: bool,
    /// Final DRAM address
    pub dram: DramAddr,
}

/// Decodes `phys` and returns all intermediate addresses.
///
/// # Arguments
///
/// * `phys` - Physical address, less than 2^48
/// * `nodes` - Memory-controller nodes, scanned in order
/// * `regs` - Register accessor
///
/// # Errors
///
/// Fails with the error of the first stage that fails; no partial result is returned.
pub fn translate<R: RegisterAccessor + ?Sized>(
    phys: u64,
    nodes: &[PciDevice],
    regs: &mut R,
) -> Result<Translation, DecodeError> {
    let node = resolve_node(phys, nodes, regs)?;
    let dev = nodes[node.node_index];
    let rank = resolve_rank(node.normalized, dev, node.channel, regs)?;
    let geometry = decode_geometry(rank.rank_addr, dev, node.channel, regs)?;
    Ok(Translation {
        physical: node.physical,
        normalized: node.normalized,
        rank_addr: rank.rank_addr,
        spare_in_use: rank.spare_in_use,
        dram: DramAddr::from_stages(&node, &rank, &geometry),
    })
}

/// Decodes `phys` to its DRAM address.
///
/// # Errors
///
/// See [`translate`].
pub fn decode<R: RegisterAccessor + ?Sized>(
    phys: u64,
    nodes: &[PciDevice],
    regs: &mut R,
) -> Result<DramAddr, DecodeError> {
    translate(phys, nodes, regs).map(|t| t.dram)
}

/// A node list bound to a register accessor.
///
/// # Examples
///
/// ```
/// use dramloc_core::decode::DramDecoder;
/// use dramloc_core::pci::{PciDevice, RegisterSnapshot};
///
/// let mut decoder = DramDecoder::new(vec![PciDevice::new(0, 0, 0x18)], RegisterSnapshot::new());
/// // an empty snapshot cannot answer any register read
/// assert!(decoder.decode(0x1000).is_err());
/// ```
pub struct DramDecoder<R> {
    nodes: Vec<PciDevice>,
    registers: R,
}

impl<R: RegisterAccessor> DramDecoder<R> {
    /// Creates a decoder for `nodes`, reading registers through `registers`.
    pub fn new(nodes: Vec<PciDevice>, registers: R) -> Self {
        info!("Decoding with {} memory-controller node(s)", nodes.len());
        DramDecoder { nodes, registers }
    }

    /// Decodes `phys` to its DRAM address.
    ///
    /// # Errors
    ///
    /// See [`translate`].
    pub fn decode(&mut self, phys: u64) -> Result<DramAddr, DecodeError> {
        decode(phys, &self.nodes, &mut self.registers)
    }

    /// Decodes `phys` and returns all intermediate addresses.
    ///
    /// # Errors
    ///
    /// See [`translate`].
    pub fn translate(&mut self, phys: u64) -> Result<Translation, DecodeError> {
        translate(phys, &self.nodes, &mut self.registers)
    }

    /// The memory-controller nodes, in scan order.
    pub fn nodes(&self) -> &[PciDevice] {
        &self.nodes
    }

    /// The register accessor.
    pub fn registers(&self) -> &R {
        &self.registers
    }

    /// Consumes the decoder and returns the register accessor.
    pub fn into_registers(self) -> R {
        self.registers
    }
}

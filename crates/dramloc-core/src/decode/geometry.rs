//! Rank address to bank, row and column.

use log::debug;

use super::error::{DecodeError, Stage};
use super::{FN_DRAM_CONTROLLER, channel_offset, read};
use crate::pci::{PciDevice, RegisterAccessor};

/// Function 2 offset of the DRAM bank address mapping register
const BANK_ADDRESS_MAPPING: u16 = 0x80;

/// The only address map mode that can be decoded.
pub const ADDRESS_MAP_MODE: u8 = 0b111;

/// Bank, row and column of a rank address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Bank (3 bits)
    pub bank: u8,
    /// Row (15 bits)
    pub row: u32,
    /// Column (10 bits)
    pub col: u16,
}

impl Geometry {
    /// Splits `rank_addr` according to address map mode `0b111`.
    ///
    /// The two row bits at 17..=16 become the top row bits, the thirteen bits at 30..=18 the
    /// low row bits.
    pub fn from_rank_address(rank_addr: u64) -> Self {
        Geometry {
            bank: ((rank_addr >> 13) & 0x7) as u8,
            row: ((((rank_addr >> 16) & 0x3) << 13) | ((rank_addr >> 18) & 0x1FFF)) as u32,
            col: ((rank_addr >> 3) & 0x3FF) as u16,
        }
    }
}

/// Reads the address map mode of `channel` on node `dev` and splits `rank_addr`.
///
/// # Errors
///
/// * [`DecodeError::RegisterRead`] if the bank address mapping register cannot be read
/// * [`DecodeError::UnsupportedAddressMap`] if the mode is anything but [`ADDRESS_MAP_MODE`]
pub fn decode_geometry<R: RegisterAccessor + ?Sized>(
    rank_addr: u64,
    dev: PciDevice,
    channel: u8,
    regs: &mut R,
) -> Result<Geometry, DecodeError> {
    let reg = read(
        regs,
        dev.register(
            FN_DRAM_CONTROLLER,
            BANK_ADDRESS_MAPPING + channel_offset(channel),
        ),
        Stage::Geometry,
    )?;
    let mode = (reg & 0xF) as u8;
    if mode != ADDRESS_MAP_MODE {
        return Err(DecodeError::UnsupportedAddressMap {
            mode,
            device: dev,
            channel,
        });
    }
    let geometry = Geometry::from_rank_address(rank_addr);
    debug!(
        "rank address {:#014x}: bank {}, row {}, column {}",
        rank_addr, geometry.bank, geometry.row, geometry.col
    );
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::{Geometry, decode_geometry};
    use crate::decode::error::DecodeError;
    use crate::pci::{PciDevice, RegisterSnapshot};

    const DEV: PciDevice = PciDevice {
        domain: 0,
        bus: 0,
        slot: 0x19,
    };

    #[test]
    fn test_known_rank_address() {
        let g = Geometry::from_rank_address(0x1A_2B3C);
        assert_eq!(g.bank, 1);
        assert_eq!(g.row, 0x4006);
        assert_eq!(g.col, 0x167);
    }

    #[test]
    fn test_field_widths() {
        let g = Geometry::from_rank_address(u64::MAX);
        assert_eq!(g.bank, 0x7);
        assert_eq!(g.row, 0x7FFF);
        assert_eq!(g.col, 0x3FF);
        assert_eq!(
            Geometry::from_rank_address(0x7),
            Geometry {
                bank: 0,
                row: 0,
                col: 0
            }
        );
    }

    #[test]
    fn test_mode_read_per_channel() -> anyhow::Result<()> {
        let mut regs = RegisterSnapshot::new()
            .with(DEV.register(2, 0x80), 0x2)
            .with(DEV.register(2, 0x180), 0xF7);
        let g = decode_geometry(0x1A_2B3C, DEV, 1, &mut regs)?;
        assert_eq!(g.row, 16390);
        assert_eq!(g.col, 359);
        match decode_geometry(0x1A_2B3C, DEV, 0, &mut regs) {
            Err(DecodeError::UnsupportedAddressMap { mode, channel, .. }) => {
                assert_eq!(mode, 0x2);
                assert_eq!(channel, 0);
            }
            other => panic!("unexpected result {:?}", other),
        }
        Ok(())
    }
}

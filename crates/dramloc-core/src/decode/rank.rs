//! Rank selection: normalized DCT address to chip select and rank address.

use log::{debug, trace, warn};

use super::bits::compact_masked_bits;
use super::error::{DecodeError, Stage};
use super::{FN_DRAM_CONTROLLER, FN_MISC_CONTROL, channel_offset, read};
use crate::pci::{PciDevice, RegisterAccessor};
use crate::util::MAX_RANKS;

/// Function 2 offset of the first DRAM CS base address register
const CS_BASE: u16 = 0x40;
/// Function 2 offset of the first DRAM CS mask register
const CS_MASK: u16 = 0x60;
/// Function 3 offset of the online spare control register
const ONLINE_SPARE_CONTROL: u16 = 0xB0;

/// Base and mask of one chip select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChipSelect {
    /// Chip select is enabled
    pub enabled: bool,
    /// Base address, in units of 256 bytes
    pub base: u32,
    /// Address mask, in units of 256 bytes; set bits are ignored when matching
    pub mask: u32,
}

impl ChipSelect {
    /// Decodes a DRAM CS base address register and its DRAM CS mask register.
    ///
    /// Mask bits that the hardware does not compare are forced to one.
    pub fn from_registers(base: u32, mask: u32) -> Self {
        ChipSelect {
            enabled: base & 0x1 != 0,
            base: base & 0x1FF8_3FE0,
            mask: (mask | 0x0007_C01F) & 0x1FFF_FFFF,
        }
    }

    /// Returns `true` if the chip select is enabled and its masked base matches `normalized`.
    pub fn matches(&self, normalized: u64) -> bool {
        let mask = !(self.mask as u64);
        self.enabled && ((normalized >> 8) & mask) == (self.base as u64 & mask)
    }

    /// Removes the rank selection bits from `normalized`.
    pub fn rank_address(&self, normalized: u64) -> u64 {
        compact_masked_bits(normalized, ((self.mask as u64) << 8) | 0xFF)
    }
}

/// Online spare control state for both channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OnlineSpare {
    /// Per channel: spare swap done
    pub swap_done: [bool; 2],
    /// Per channel: rank replaced by the spare
    pub bad_rank: [u8; 2],
}

impl OnlineSpare {
    /// Decodes the online spare control register.
    pub fn from_register(reg: u32) -> Self {
        OnlineSpare {
            swap_done: [(reg >> 1) & 0x1 != 0, (reg >> 3) & 0x1 != 0],
            bad_rank: [((reg >> 4) & 0x7) as u8, ((reg >> 8) & 0x7) as u8],
        }
    }

    /// Returns `true` if `rank` on `channel` has been replaced by the spare rank.
    pub fn replaced(&self, channel: u8, rank: u8) -> bool {
        let ch = (channel & 0x1) as usize;
        self.swap_done[ch] && self.bad_rank[ch] == rank
    }
}

/// Result of [`resolve_rank`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankResolution {
    /// Chip select (rank) owning the address
    pub rank: u8,
    /// Address within the rank
    pub rank_addr: u64,
    /// The rank has been swapped out for the online spare
    ///
    /// Only reported; the decode does not follow the swap to the spare rank.
    pub spare_in_use: bool,
}

/// Finds the rank owning `normalized` on `channel` of node `dev`.
///
/// Chip selects are tested in ascending order and the first match wins.
/// Odd and even chip selects share one mask register.
///
/// # Errors
///
/// * [`DecodeError::RegisterRead`] as soon as any register read fails
/// * [`DecodeError::NoMatchingRank`] if no enabled chip select matches
pub fn resolve_rank<R: RegisterAccessor + ?Sized>(
    normalized: u64,
    dev: PciDevice,
    channel: u8,
    regs: &mut R,
) -> Result<RankResolution, DecodeError> {
    for cs in 0..MAX_RANKS {
        let cs_offset = channel_offset(channel);
        let base = read(
            regs,
            dev.register(FN_DRAM_CONTROLLER, CS_BASE + ((cs as u16) << 2) + cs_offset),
            Stage::Rank,
        )?;
        let mask = read(
            regs,
            dev.register(
                FN_DRAM_CONTROLLER,
                CS_MASK + (((cs & !1) as u16) << 1) + cs_offset,
            ),
            Stage::Rank,
        )?;
        let chip = ChipSelect::from_registers(base, mask);
        trace!(
            "rank {}: base {:#014x}, mask {:#x}, enabled {}",
            cs,
            (chip.base as u64) << 8,
            chip.mask,
            chip.enabled
        );

        if !chip.matches(normalized) {
            continue;
        }

        let spare = OnlineSpare::from_register(read(
            regs,
            dev.register(FN_MISC_CONTROL, ONLINE_SPARE_CONTROL),
            Stage::Rank,
        )?);
        let spare_in_use = spare.replaced(channel, cs);
        if spare_in_use {
            warn!(
                "rank {} on {} channel {} has been replaced by the online spare rank",
                cs, dev, channel
            );
        }

        let rank_addr = chip.rank_address(normalized);
        debug!(
            "normalized address {:#014x} is on rank {}, rank address {:#014x}",
            normalized, cs, rank_addr
        );
        return Ok(RankResolution {
            rank: cs,
            rank_addr,
            spare_in_use,
        });
    }

    Err(DecodeError::NoMatchingRank {
        normalized,
        device: dev,
        channel,
    })
}

#[cfg(test)]
mod tests {
    use super::{ChipSelect, OnlineSpare, resolve_rank};
    use crate::decode::error::DecodeError;
    use crate::pci::{PciDevice, RegisterSnapshot};

    const DEV: PciDevice = PciDevice {
        domain: 0,
        bus: 0,
        slot: 0x18,
    };

    /// Two 2 GB ranks on channel `channel`: cs0 at 0, cs1 at 2 GB, all others disabled.
    fn two_ranks(channel: u16, spare: u32) -> RegisterSnapshot {
        let off = channel * 0x100;
        let mut regs = RegisterSnapshot::new();
        for cs in 0..8u16 {
            regs.set(DEV.register(2, 0x40 + (cs << 2) + off), 0);
        }
        for pair in 0..4u16 {
            regs.set(DEV.register(2, 0x60 + (pair << 2) + off), 0);
        }
        regs.set(DEV.register(2, 0x40 + off), 0x1);
        regs.set(DEV.register(2, 0x44 + off), 0x0080_0001);
        regs.set(DEV.register(2, 0x60 + off), 0x007F_FFFF);
        regs.set(DEV.register(3, 0xB0), spare);
        regs
    }

    #[test]
    fn test_chip_select_decoding() {
        let chip = ChipSelect::from_registers(0xFFFF_FFFF, 0);
        assert!(chip.enabled);
        assert_eq!(chip.base, 0x1FF8_3FE0);
        assert_eq!(chip.mask, 0x0007_C01F);
        let chip = ChipSelect::from_registers(0x0080_0000, 0xFFFF_FFFF);
        assert!(!chip.enabled);
        assert_eq!(chip.mask, 0x1FFF_FFFF);
        assert!(!chip.matches(0x8000_0000));
    }

    #[test]
    fn test_rank_address_identity_for_full_mask() {
        let chip = ChipSelect::from_registers(0x1, 0x00FF_FFFF);
        assert!(chip.matches(0x12345));
        assert_eq!(chip.rank_address(0x12345), 0x12345);
    }

    #[test]
    fn test_second_rank() -> anyhow::Result<()> {
        let mut regs = two_ranks(0, 0);
        let res = resolve_rank(0x8000_1040, DEV, 0, &mut regs)?;
        assert_eq!(res.rank, 1);
        assert_eq!(res.rank_addr, 0x1040);
        assert!(!res.spare_in_use);

        let res = resolve_rank(0x7FFF_FFC0, DEV, 0, &mut regs)?;
        assert_eq!(res.rank, 0);
        assert_eq!(res.rank_addr, 0x7FFF_FFC0);
        Ok(())
    }

    #[test]
    fn test_channel_one_registers() -> anyhow::Result<()> {
        let mut regs = two_ranks(1, 0);
        assert_eq!(resolve_rank(0x8000_0000, DEV, 1, &mut regs)?.rank, 1);
        // channel 0 registers are absent
        assert!(matches!(
            resolve_rank(0x8000_0000, DEV, 0, &mut regs),
            Err(DecodeError::RegisterRead { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_no_matching_rank() {
        let mut regs = two_ranks(0, 0);
        match resolve_rank(0x1_0000_0000, DEV, 0, &mut regs) {
            Err(DecodeError::NoMatchingRank {
                normalized,
                device,
                channel,
            }) => {
                assert_eq!(normalized, 0x1_0000_0000);
                assert_eq!(device, DEV);
                assert_eq!(channel, 0);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_online_spare_is_advisory() -> anyhow::Result<()> {
        // channel 0: swap done, bad rank 1
        let mut regs = two_ranks(0, 0x2 | (1 << 4));
        let res = resolve_rank(0x8000_0000, DEV, 0, &mut regs)?;
        assert_eq!(res.rank, 1);
        assert!(res.spare_in_use);
        let res = resolve_rank(0x0, DEV, 0, &mut regs)?;
        assert_eq!(res.rank, 0);
        assert!(!res.spare_in_use);
        Ok(())
    }

    #[test]
    fn test_online_spare_decoding() {
        let spare = OnlineSpare::from_register(0x8 | (5 << 8) | (3 << 4));
        assert!(!spare.replaced(0, 3));
        assert!(spare.replaced(1, 5));
        assert!(!spare.replaced(1, 3));
    }
}

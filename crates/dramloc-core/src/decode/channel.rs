//! Channel (DCT) selection and address normalization within a node.
//!
//! Decodes function 2 registers `0x10C` (swap interleaved region) and `0x110`/`0x114`
//! (DRAM controller select low/high) and applies them to a physical address that is
//! already known to belong to the node.

use log::debug;

use super::bits::{bit, parity};
use super::node::{MemoryHole, NodeRange};
use crate::util::FOUR_GB;

/// Function 2 offset of the swap interleaved region register
pub(crate) const SWAP_INTLV_REGION: u16 = 0x10C;
/// Function 2 offset of the DCT select low register
pub(crate) const DCT_SELECT_LOW: u16 = 0x110;
/// Function 2 offset of the DCT select high register
pub(crate) const DCT_SELECT_HIGH: u16 = 0x114;

/// Swap interleaved region configuration.
///
/// All fields are in units of 128 MB (address bits 33..27).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionSwap {
    /// Region swapping is enabled
    pub enabled: bool,
    /// Base of the swapped region
    pub base: u64,
    /// Limit of the swapped region
    pub limit: u64,
    /// Size of the region swapped with the base region
    pub size: u64,
}

impl RegionSwap {
    /// Decodes the swap interleaved region register.
    pub fn from_register(reg: u32) -> Self {
        RegionSwap {
            enabled: reg & 1 != 0,
            base: ((reg >> 3) & 0x7F) as u64,
            limit: ((reg >> 11) & 0x7F) as u64,
            size: ((reg >> 20) & 0x7F) as u64,
        }
    }

    /// Applies the swap to `phys`, returning the address the DCTs decode.
    ///
    /// Only addresses below 16 GB are affected: those inside `[base, limit]` and those below
    /// `size` have the base region bits XORed in.
    pub fn apply(&self, phys: u64) -> u64 {
        if !self.enabled || phys >> 34 != 0 {
            return phys;
        }
        let region = phys >> 27;
        if (region >= self.base && region <= self.limit) || region < self.size {
            phys ^ (self.base << 27)
        } else {
            phys
        }
    }
}

/// DRAM controller select configuration of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DctSelect {
    /// High address range goes to a fixed DCT
    pub high_range_enabled: bool,
    /// DCT serving the high address range
    pub select_high: u8,
    /// Channel interleaving is enabled
    pub interleave_enabled: bool,
    /// Both DCTs are ganged into one 128-bit channel
    pub ganged: bool,
    /// Channel interleave address select (2 bits)
    pub interleave_addr: u8,
    /// Start of the high range, register bits 31..11 (address bits 47..27)
    pub base_addr: u32,
    /// Offset subtracted from high range addresses
    pub base_offset: u64,
}

impl DctSelect {
    /// Decodes the DCT select low (`0x110`) and high (`0x114`) registers.
    pub fn from_registers(low: u32, high: u32) -> Self {
        DctSelect {
            high_range_enabled: low & 0x1 != 0,
            select_high: ((low >> 1) & 0x1) as u8,
            interleave_enabled: low & 0x4 != 0,
            ganged: low & 0x10 != 0,
            interleave_addr: ((low >> 6) & 0x3) as u8,
            base_addr: low & 0xFFFF_F800,
            base_offset: ((high & 0xFFFF_FC00) as u64) << 16,
        }
    }

    /// Returns `true` if `phys` falls into the high range served by a fixed DCT.
    pub fn high_range_selected(&self, phys: u64) -> bool {
        self.high_range_enabled && !self.ganged && (phys >> 27) >= (self.base_addr >> 11) as u64
    }

    /// Selects the channel serving `phys`.
    ///
    /// `interleave_enable` is the node interleave enable field of the owning node; it
    /// decides which address bit carries the channel when the interleave address select
    /// does not. Rules are evaluated in order and the first match wins.
    pub fn select_channel(&self, phys: u64, interleave_enable: u8) -> u8 {
        if self.ganged {
            0
        } else if self.high_range_selected(phys) {
            self.select_high
        } else if self.interleave_enabled && self.interleave_addr == 0 {
            bit(phys, 6)
        } else if self.interleave_enabled && self.interleave_addr & 0x2 != 0 {
            let hash = parity((phys >> 16) & 0x1F);
            if self.interleave_addr & 0x1 != 0 {
                bit(phys, 9) ^ hash
            } else {
                bit(phys, 6) ^ hash
            }
        } else if self.interleave_enabled && interleave_enable & 0x4 != 0 {
            bit(phys, 15)
        } else if self.interleave_enabled && interleave_enable & 0x2 != 0 {
            bit(phys, 14)
        } else if self.interleave_enabled && interleave_enable & 0x1 != 0 {
            bit(phys, 13)
        } else if self.interleave_enabled {
            bit(phys, 12)
        } else if self.high_range_enabled && !self.ganged {
            !self.select_high & 0x1
        } else {
            0
        }
    }

    /// Returns the offset subtracted from `phys` to obtain the DCT address.
    ///
    /// Addresses hoisted above 4 GB use the memory hole offset; other addresses use the
    /// high range offset or the node's DRAM base.
    pub fn channel_offset(&self, phys: u64, range: &NodeRange, hole: &MemoryHole) -> u64 {
        let hoisted = hole.enabled && phys >= FOUR_GB;
        if self.high_range_selected(phys) {
            if self.base_addr & 0xFFFF_0000 == 0 && hoisted {
                hole.offset()
            } else {
                self.base_offset
            }
        } else if hoisted {
            hole.offset()
        } else {
            range.base & 0xFFFF_F800_0000
        }
    }

    /// Returns `true` if the channel interleave bit must be removed from the DCT address.
    pub fn strips_channel_bit(&self, phys: u64) -> bool {
        self.interleave_enabled && !self.high_range_selected(phys) && !self.ganged
    }
}

/// Removes the channel offset, node interleave bits and channel interleave bit from `phys`.
///
/// `ilog` is the number of node interleave bits (see [`NodeRange::interleave_shift`]).
/// The cacheline offset (bits 5..0) of `phys` is carried over unchanged.
pub fn normalize(phys: u64, offset: u64, ilog: u32, dct: &DctSelect) -> u64 {
    let mut addr = (phys & 0xFFFF_FFFF_FFC0).wrapping_sub(offset & 0xFFFF_FF80_0000);

    // node interleave bits sit right above the 4k page
    let line = addr & 0xFC0;
    addr = ((addr >> ilog) & 0xFFFF_FFFF_F000) | line;

    if dct.strips_channel_bit(phys) {
        addr = match dct.interleave_addr {
            0 | 2 => (addr >> 1) & !0x3F,
            1 => ((addr & !0x1FFF) >> 1) | (addr & 0xFC0),
            _ => ((addr & !0x3FF) >> 1) | (addr & 0x1C0),
        };
    }

    let normalized = addr | (phys & 0x3F);
    debug!(
        "physical address {:#014x} normalized to DCT address {:#014x}",
        phys, normalized
    );
    normalized
}

#[cfg(test)]
mod tests {
    use super::{DctSelect, RegionSwap, normalize};
    use crate::decode::node::{MemoryHole, NodeRange};

    const GANGED: u32 = 0x10;
    const HI_RANGE_EN: u32 = 0x1;
    const SEL_HI: u32 = 0x2;
    const INTLV_EN: u32 = 0x4;

    fn intlv_addr(v: u32) -> u32 {
        v << 6
    }

    #[test]
    fn test_ganged_beats_high_range() {
        // high range would select DCT1 for everything (base_addr 0)
        let dct = DctSelect::from_registers(GANGED | HI_RANGE_EN | SEL_HI | INTLV_EN, 0);
        assert!(!dct.high_range_selected(0x1_0000_0000));
        assert_eq!(dct.select_channel(0x1_0000_0040, 0), 0);
        let dct = DctSelect::from_registers(HI_RANGE_EN | SEL_HI | INTLV_EN, 0);
        assert!(dct.high_range_selected(0x1_0000_0000));
        assert_eq!(dct.select_channel(0x1_0000_0000, 0), 1);
    }

    #[test]
    fn test_high_range_beats_interleave() {
        // high range starts at 2 GB: base_addr bits 31..11 hold address bits 47..27
        let base = (0x8000_0000u64 >> 27 << 11) as u32;
        let dct = DctSelect::from_registers(base | HI_RANGE_EN | INTLV_EN, 0);
        // below the high range, bit 6 interleaves
        assert_eq!(dct.select_channel(0x40, 0), 1);
        assert_eq!(dct.select_channel(0x80, 0), 0);
        // inside the high range, DctSelHi (0) wins even though bit 6 is set
        assert_eq!(dct.select_channel(0x8000_0040, 0), 0);
    }

    #[test]
    fn test_hash_interleave() {
        let dct = DctSelect::from_registers(INTLV_EN | intlv_addr(2), 0);
        // bit 6 xor parity of bits 20..16
        assert_eq!(dct.select_channel(0x0, 0), 0);
        assert_eq!(dct.select_channel(0x40, 0), 1);
        assert_eq!(dct.select_channel(0x1_0000, 0), 1);
        assert_eq!(dct.select_channel(0x1_0040, 0), 0);
        assert_eq!(dct.select_channel(0x3_0000, 0), 0);
        // bit 21 is outside the hash
        assert_eq!(dct.select_channel(0x20_0000, 0), 0);

        let dct = DctSelect::from_registers(INTLV_EN | intlv_addr(3), 0);
        // bit 9 xor parity of bits 20..16; bit 6 is ignored
        assert_eq!(dct.select_channel(0x40, 0), 0);
        assert_eq!(dct.select_channel(0x200, 0), 1);
        assert_eq!(dct.select_channel(0x1_0200, 0), 0);
        assert_eq!(dct.select_channel(0x1F_0000, 0), 1);
    }

    #[test]
    fn test_node_interleave_taps() {
        let dct = DctSelect::from_registers(INTLV_EN | intlv_addr(1), 0);
        assert_eq!(dct.select_channel(1 << 15, 0b100), 1);
        assert_eq!(dct.select_channel(1 << 14, 0b100), 0);
        assert_eq!(dct.select_channel(1 << 14, 0b011), 1);
        assert_eq!(dct.select_channel(1 << 13, 0b001), 1);
        assert_eq!(dct.select_channel(1 << 13, 0b010), 0);
        assert_eq!(dct.select_channel(1 << 12, 0b000), 1);
        assert_eq!(dct.select_channel(1 << 6, 0b000), 0);
    }

    #[test]
    fn test_fallback_rules() {
        // high range enabled, address below it: the other DCT
        let base = (0x1_0000_0000u64 >> 27 << 11) as u32;
        let dct = DctSelect::from_registers(base | HI_RANGE_EN | SEL_HI, 0);
        assert_eq!(dct.select_channel(0x1000, 0), 0);
        let dct = DctSelect::from_registers(base | HI_RANGE_EN, 0);
        assert_eq!(dct.select_channel(0x1000, 0), 1);
        // nothing enabled
        let dct = DctSelect::from_registers(0, 0);
        assert_eq!(dct.select_channel(0xFFFF_FFFF, 0b111), 0);
    }

    #[test]
    fn test_region_swap() {
        // base region 1 (128 MB..256 MB), limit 1, size 1
        let swap = RegionSwap::from_register(1 | (1 << 3) | (1 << 11) | (1 << 20));
        assert_eq!(swap.base, 1);
        assert_eq!(swap.limit, 1);
        assert_eq!(swap.size, 1);
        assert_eq!(swap.apply(0x0800_1234), 0x0000_1234);
        assert_eq!(swap.apply(0x0000_1234), 0x0800_1234);
        assert_eq!(swap.apply(0x1000_1234), 0x1000_1234);
        // above 16 GB nothing is swapped
        assert_eq!(swap.apply(0x4_0800_1234), 0x4_0800_1234);
        let disabled = RegionSwap::from_register((1 << 3) | (1 << 11) | (1 << 20));
        assert_eq!(disabled.apply(0x0800_1234), 0x0800_1234);
    }

    #[test]
    fn test_channel_offset() {
        let range = NodeRange {
            base: 0x1_0000_0000,
            limit: 0x2_FFFF_FFFF,
            dram_enabled: true,
            interleave_enable: 0,
            interleave_select: 0,
            node_id: 1,
        };
        let hole = MemoryHole {
            enabled: true,
            offset_field: 0x0080,
        };
        let dct = DctSelect::from_registers(GANGED, 0);
        assert_eq!(dct.channel_offset(0x1_2345_0000, &range, &hole), 0x80_0000);
        let no_hole = MemoryHole::default();
        assert_eq!(
            dct.channel_offset(0x1_2345_0000, &range, &no_hole),
            0x1_0000_0000
        );

        // high range from 8 GB with its own offset
        let base = (0x2_0000_0000u64 >> 27 << 11) as u32;
        let dct = DctSelect::from_registers(base | HI_RANGE_EN, 0x0001_0000);
        assert_eq!(dct.base_offset, 0x1_0000_0000);
        assert_eq!(
            dct.channel_offset(0x2_0000_0000, &range, &hole),
            0x1_0000_0000
        );
    }

    #[test]
    fn test_high_range_offset_of_hoisted_memory() {
        let range = NodeRange {
            base: 0,
            limit: 0x2_FFFF_FFFF,
            dram_enabled: true,
            interleave_enable: 0,
            interleave_select: 0,
            node_id: 0,
        };
        let hole = MemoryHole {
            enabled: true,
            offset_field: 0x0080,
        };
        // high range from 128 MB: base_addr has no bits above 15
        let dct = DctSelect::from_registers(0x0800 | HI_RANGE_EN, 0x0001_0000);
        assert_eq!(dct.base_addr & 0xFFFF_0000, 0);
        assert!(dct.high_range_selected(0x1_2345_0000));
        // above 4 GB the hole offset replaces the high range offset
        assert_eq!(dct.channel_offset(0x1_2345_0000, &range, &hole), 0x80_0000);
        // below 4 GB, or without a hole, the high range offset applies
        assert_eq!(
            dct.channel_offset(0x9000_0000, &range, &hole),
            0x1_0000_0000
        );
        assert_eq!(
            dct.channel_offset(0x1_2345_0000, &range, &MemoryHole::default()),
            0x1_0000_0000
        );
    }

    #[test]
    fn test_normalize_identity() {
        let dct = DctSelect::from_registers(GANGED, 0);
        assert_eq!(normalize(0x12345, 0, 0, &dct), 0x12345);
        assert_eq!(normalize(0xFFFF_FFFF, 0, 0, &dct), 0xFFFF_FFFF);
    }

    #[test]
    fn test_normalize_removes_offset_and_node_bit() {
        let dct = DctSelect::from_registers(GANGED, 0);
        // base 4 GB, two-way node interleave on bit 12
        let norm = normalize(0x1_0000_3FC5, 0x1_0000_0000, 1, &dct);
        assert_eq!(norm, 0x1FC5);
    }

    #[test]
    fn test_normalize_wide_node_interleave() {
        let dct = DctSelect::from_registers(GANGED, 0);
        // four nodes: bits 13..12 removed, bits 11..6 and 5..0 kept
        assert_eq!(normalize(0x1_2345_6789, 0, 2, &dct), 0x48D1_5789);
        // enable 0b111 shifts by seven bits
        assert_eq!(normalize(0x1_2345_6789, 0, 7, &dct), 0x0246_8789);
        // node bits and then the channel bit on bit 6
        let dct = DctSelect::from_registers(INTLV_EN, 0);
        assert_eq!(normalize(0x1_2345_6789, 0, 2, &dct), 0x2468_ABC9);
    }

    #[test]
    fn test_normalize_removes_channel_bit() {
        // interleave on bit 6
        let dct = DctSelect::from_registers(INTLV_EN, 0);
        assert_eq!(normalize(0x1C0, 0, 0, &dct), 0xC0);
        // interleave on bit 12 (interleave address 1)
        let dct = DctSelect::from_registers(INTLV_EN | intlv_addr(1), 0);
        assert_eq!(normalize(0x3_F041, 0, 0, &dct), 0x1_F041);
        // hashed on bit 9 (interleave address 3)
        let dct = DctSelect::from_registers(INTLV_EN | intlv_addr(3), 0);
        assert_eq!(normalize(0xFC0, 0, 0, &dct), 0x7C0);
    }
}

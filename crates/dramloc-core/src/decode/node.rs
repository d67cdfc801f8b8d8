//! Node selection: physical address to normalized DCT address.

use log::{debug, trace};

use super::channel::{DCT_SELECT_HIGH, DCT_SELECT_LOW, DctSelect, RegionSwap, SWAP_INTLV_REGION};
use super::error::{DecodeError, InvalidInput, Stage};
use super::{FN_ADDRESS_MAP, FN_DRAM_CONTROLLER, read};
use crate::pci::{PciDevice, RegisterAccessor};
use crate::util::{MAX_NODES, PHYS_ADDR_LIMIT};

/// Function 1 offset of the first DRAM base low register
const DRAM_BASE_LOW: u16 = 0x40;
/// Function 1 offset of the first DRAM limit low register
const DRAM_LIMIT_LOW: u16 = 0x44;
/// Distance between the low and high halves of a base/limit register
const HIGH_HALF: u16 = 0x100;
/// Function 1 offset of the DRAM hole address register
const DRAM_HOLE: u16 = 0xF0;

/// DRAM address range of one node (DRAM base/limit register pair).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeRange {
    /// First byte of the range
    pub base: u64,
    /// Last byte of the range
    pub limit: u64,
    /// Reads or writes to the range are enabled
    pub dram_enabled: bool,
    /// Node interleave enable (3 bits)
    pub interleave_enable: u8,
    /// Node interleave select (3 bits)
    pub interleave_select: u8,
    /// Destination node id
    pub node_id: u8,
}

impl NodeRange {
    /// Decodes the four halves of a DRAM base/limit register pair.
    pub fn from_registers(base_low: u32, base_high: u32, limit_low: u32, limit_high: u32) -> Self {
        let base = ((((base_high & 0xFF) as u64) << 32) | (base_low & 0xFFFF_0000) as u64) << 8;
        let limit =
            (((((limit_high & 0xFF) as u64) << 32) | (limit_low | 0xFFFF) as u64) << 8) | 0xFF;
        NodeRange {
            base,
            limit,
            dram_enabled: base_low & 0x3 != 0,
            interleave_enable: ((base_low >> 8) & 0x7) as u8,
            interleave_select: ((limit_low >> 8) & 0x7) as u8,
            node_id: (limit_low & 0x7) as u8,
        }
    }

    /// Returns `true` if the range is enabled and contains `phys`.
    pub fn contains(&self, phys: u64) -> bool {
        self.dram_enabled && self.base <= phys && phys <= self.limit
    }

    /// Number of node interleave bits removed from the normalized address (`Ilog`).
    ///
    /// Zero if node interleaving is disabled or the interleave select does not match
    /// address bits 14..12 under the enable mask.
    pub fn interleave_shift(&self, phys: u64) -> u32 {
        if self.interleave_enable == 0 {
            return 0;
        }
        if self.interleave_select as u64 != (phys >> 12) & self.interleave_enable as u64 {
            return 0;
        }
        match self.interleave_enable {
            0b001 => 1,
            0b011 => 2,
            0b111 => 7,
            _ => 0,
        }
    }
}

/// DRAM hole (memory hoisting) configuration of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryHole {
    /// Memory hoisting is enabled
    pub enabled: bool,
    /// DramHoleOffset field, register bits 15..7
    pub offset_field: u32,
}

impl MemoryHole {
    /// Decodes the DRAM hole address register.
    pub fn from_register(reg: u32) -> Self {
        MemoryHole {
            enabled: reg & 0x1 != 0,
            offset_field: reg & 0xFF80,
        }
    }

    /// Offset subtracted from hoisted addresses.
    pub fn offset(&self) -> u64 {
        (self.offset_field as u64) << 16
    }
}

/// Result of [`resolve_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeResolution {
    /// Node id of the owning node (from its DRAM limit register)
    pub node: u8,
    /// Channel (DCT) within the node
    pub channel: u8,
    /// Normalized DCT address
    pub normalized: u64,
    /// Index of the owning node in the candidate list
    pub node_index: usize,
    /// Physical address after the interleaved region swap
    pub physical: u64,
}

/// Finds the node owning `phys` and computes its normalized address.
///
/// Nodes are scanned in the given order and the first node whose enabled base/limit range
/// contains the address wins. Overlapping ranges are a misconfiguration; the order of
/// `nodes` decides which of them is reported.
///
/// # Errors
///
/// * [`DecodeError::InvalidInput`] if `phys` has more than 48 bits or `nodes` is empty or
///   has more than eight entries
/// * [`DecodeError::RegisterRead`] as soon as any register read fails
/// * [`DecodeError::NoOwningNode`] if no node owns the address
pub fn resolve_node<R: RegisterAccessor + ?Sized>(
    phys: u64,
    nodes: &[PciDevice],
    regs: &mut R,
) -> Result<NodeResolution, DecodeError> {
    if phys >= PHYS_ADDR_LIMIT {
        return Err(InvalidInput::AddressTooWide(phys).into());
    }
    if nodes.is_empty() {
        return Err(InvalidInput::NoNodes.into());
    }
    if nodes.len() > MAX_NODES {
        return Err(InvalidInput::TooManyNodes(nodes.len()).into());
    }

    for (idx, &dev) in nodes.iter().enumerate() {
        let range = read_range(regs, dev, idx)?;
        let hole = MemoryHole::from_register(read(
            regs,
            dev.register(FN_ADDRESS_MAP, DRAM_HOLE),
            Stage::Node,
        )?);
        trace!(
            "node {} ({}): base {:#014x}, limit {:#014x}, hole {:?}",
            range.node_id, dev, range.base, range.limit, hole
        );

        if !range.contains(phys) {
            continue;
        }
        debug!("physical address {:#014x} belongs to node {}", phys, range.node_id);

        let ilog = range.interleave_shift(phys);

        let swap = RegionSwap::from_register(read(
            regs,
            dev.register(FN_DRAM_CONTROLLER, SWAP_INTLV_REGION),
            Stage::Node,
        )?);
        let swapped = swap.apply(phys);
        if swapped != phys {
            debug!("interleaved region swap: {:#014x} -> {:#014x}", phys, swapped);
        }

        let dct = DctSelect::from_registers(
            read(
                regs,
                dev.register(FN_DRAM_CONTROLLER, DCT_SELECT_LOW),
                Stage::Node,
            )?,
            read(
                regs,
                dev.register(FN_DRAM_CONTROLLER, DCT_SELECT_HIGH),
                Stage::Node,
            )?,
        );
        trace!("{}: {:?}", dev, dct);

        let channel = dct.select_channel(swapped, range.interleave_enable);
        let offset = dct.channel_offset(swapped, &range, &hole);
        debug!(
            "channel {}, high range {}, channel offset {:#014x}",
            channel,
            dct.high_range_selected(swapped),
            offset
        );
        let normalized = super::channel::normalize(swapped, offset, ilog, &dct);

        return Ok(NodeResolution {
            node: range.node_id,
            channel,
            normalized,
            node_index: idx,
            physical: swapped,
        });
    }

    Err(DecodeError::NoOwningNode(phys))
}

/// Reads the DRAM base/limit pair `index` from `dev`.
fn read_range<R: RegisterAccessor + ?Sized>(
    regs: &mut R,
    dev: PciDevice,
    index: usize,
) -> Result<NodeRange, DecodeError> {
    let step = (index as u16) << 3;
    let base_low = read(
        regs,
        dev.register(FN_ADDRESS_MAP, DRAM_BASE_LOW + step),
        Stage::Node,
    )?;
    let base_high = read(
        regs,
        dev.register(FN_ADDRESS_MAP, DRAM_BASE_LOW + HIGH_HALF + step),
        Stage::Node,
    )?;
    let limit_low = read(
        regs,
        dev.register(FN_ADDRESS_MAP, DRAM_LIMIT_LOW + step),
        Stage::Node,
    )?;
    let limit_high = read(
        regs,
        dev.register(FN_ADDRESS_MAP, DRAM_LIMIT_LOW + HIGH_HALF + step),
        Stage::Node,
    )?;
    Ok(NodeRange::from_registers(base_low, base_high, limit_low, limit_high))
}

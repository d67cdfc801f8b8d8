//! The `decode` module translates physical addresses into DRAM addresses.
//!
//! Decoding runs in three stages, each driven by PCI configuration registers read through a
//! [`RegisterAccessor`](crate::pci::RegisterAccessor):
//!
//! 1. [`resolve_node`]: the node whose DRAM base/limit range contains the address, the
//!    channel (DCT) within that node and the normalized DCT address.
//! 2. [`resolve_rank`]: the chip select matching the normalized address and the address
//!    within that rank.
//! 3. [`decode_geometry`]: bank, row and column of the rank address.
//!
//! [`translate`] composes the stages; [`DramDecoder`] binds a node list to an accessor.
mod bits;
mod channel;
mod error;
mod geometry;
mod node;
mod pipeline;
mod rank;

pub use self::bits::compact_masked_bits;
pub use self::channel::{DctSelect, RegionSwap, normalize};
pub use self::error::{DecodeError, InvalidInput, Stage};
pub use self::geometry::{ADDRESS_MAP_MODE, Geometry, decode_geometry};
pub use self::node::{MemoryHole, NodeRange, NodeResolution, resolve_node};
pub use self::pipeline::{DramDecoder, Translation, decode, translate};
pub use self::rank::{ChipSelect, OnlineSpare, RankResolution, resolve_rank};

use crate::pci::{RegisterAccessor, RegisterAddr};

/// Address map configuration function
pub const FN_ADDRESS_MAP: u8 = 1;
/// DRAM controller configuration function
pub const FN_DRAM_CONTROLLER: u8 = 2;
/// Miscellaneous control configuration function
pub const FN_MISC_CONTROL: u8 = 3;

/// Offset added to DRAM controller registers of channel 1.
fn channel_offset(channel: u8) -> u16 {
    if channel & 0x1 != 0 { 0x100 } else { 0 }
}

fn read<R: RegisterAccessor + ?Sized>(
    regs: &mut R,
    addr: RegisterAddr,
    stage: Stage,
) -> Result<u32, DecodeError> {
    regs.read_register(addr)
        .map_err(|source| DecodeError::RegisterRead { stage, source })
}

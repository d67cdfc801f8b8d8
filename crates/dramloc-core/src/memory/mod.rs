//! The `memory` module provides address types and virtual to physical translation.
//!
//! - `DramAddr`: A decoded DRAM address (node, channel, rank, bank, row, column).
//! - `PhysAddr`: A physical address.
//! - `VirtToPhysResolver`: A trait for resolving the physical address of a virtual address.
//! - `PageMapFile`: A resolver reading pagemap entries, with an optional last-page memo.
//! - `LinuxPageMap`: A `PageMapFile` on top of `/proc/{pid}/pagemap`.
//! - `PageMapEntry`, `VirtualPage`: The raw and decoded pagemap entry of a virtual page.
mod dram_addr;
mod pagemap_entry;
mod virt_to_phys;

pub use self::dram_addr::DramAddr;
pub use self::pagemap_entry::{PageMapEntry, VirtualPage};
pub use self::virt_to_phys::{
    LinuxPageMap, PageMapError, PageMapFile, PhysAddr, VirtToPhysResolver,
};

//! # dramloc
//!
//! Locates the DRAM cells behind virtual and physical addresses on AMD family 10h NUMA
//! machines. This crate re-exports [`dramloc_core`] and, with the default `sysfs`
//! feature, the sysfs register transport.
//!
//! ```no_run
//! use dramloc::decode::DramDecoder;
//! use dramloc::pci::CachedRegisters;
//! use dramloc::sysfs::{SysfsRegisters, discover_nodes};
//! use dramloc::util::{AMD_VENDOR_ID, FAM10H_ADDRESS_MAP_DEVICE_ID};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let nodes = discover_nodes(AMD_VENDOR_ID, FAM10H_ADDRESS_MAP_DEVICE_ID)?;
//! let mut decoder = DramDecoder::new(nodes, CachedRegisters::new(SysfsRegisters::new()));
//! println!("{}", decoder.decode(0x1234_5678)?);
//! # Ok(())
//! # }
//! ```

pub use dramloc_core::*;

/// sysfs PCI configuration register transport and node discovery.
#[cfg(feature = "sysfs")]
pub mod sysfs {
    pub use dramloc_sysfs::*;
}

//! sysfs PCI configuration register transport.
//!
//! This crate reads northbridge configuration registers through the Linux sysfs PCI
//! interface and discovers memory-controller nodes by vendor and device id.
//!
//! Implements the [`dramloc_core::pci::RegisterAccessor`] trait.
//!
//! # Platform Requirements
//!
//! - Linux with sysfs mounted at `/sys`
//! - Root privileges: unprivileged reads of `config` only return the first 64 bytes

#![warn(missing_docs)]

mod discovery;
mod sysfs;

pub use discovery::{DiscoveryError, discover_nodes, discover_nodes_in};
pub use sysfs::{SYSFS_PCI_DEVICES, SysfsRegisters};

//! # dramloc Core
//!
//! `dramloc-core` translates addresses on multi-node NUMA machines down to the DRAM
//! resource that backs them: node, channel (DCT), rank (chip select), bank, row and column.
//! Decoding follows the northbridge register semantics of AMD family 10h processors and
//! is driven entirely by the PCI configuration registers of each memory-controller node.
//!
//! ## Architecture Overview
//!
//! The crate is built around two collaborator traits:
//!
//! - [`pci::RegisterAccessor`] - Reads a 32-bit PCI configuration register. Implemented by
//!   [`pci::RegisterSnapshot`] (in-memory), [`pci::CachedRegisters`] (caching wrapper) and by
//!   transport crates such as `dramloc-sysfs`.
//!
//! - [`memory::VirtToPhysResolver`] - Resolves virtual addresses to physical addresses,
//!   implemented by [`memory::LinuxPageMap`] on top of `/proc/{pid}/pagemap`.
//!
//! ## Main Components
//!
//! - [`decode`] module - The decoding pipeline: [`decode::resolve_node`],
//!   [`decode::resolve_rank`], [`decode::decode_geometry`], composed by [`decode::translate`]
//!   and [`decode::DramDecoder`].
//!
//! - [`memory`] module - [`memory::DramAddr`], [`memory::PhysAddr`] and the page map reader.
//!
//! - [`report`] module - CSV and JSON encoding of translation records.
//!
//! - [`util`] module - Constants, [`util::Size`] and progress helpers.
//!
//! ## Platform Support
//!
//! Live decoding requires an x86_64 Linux system with AMD family 10h northbridges and
//! root privileges to read `/proc/{pid}/pagemap` and PCI configuration space. Offline decoding
//! from a [`pci::RegisterSnapshot`] works anywhere.

#![warn(missing_docs)]

pub mod decode;
pub mod memory;
pub mod pci;
pub mod report;
pub mod util;

pub use decode::{DecodeError, DramDecoder, Translation, decode, translate};
pub use memory::{DramAddr, PhysAddr};
pub use pci::{PciDevice, RegisterAccessor, RegisterAddr, RegisterError};

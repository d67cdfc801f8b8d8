//! The `pci` module provides access to PCI configuration registers of memory-controller nodes.
//!
//! - `PciDevice`: Domain, bus and slot of one northbridge node.
//! - `RegisterAddr`: A single 32-bit register, identified by device, function and offset.
//! - `RegisterAccessor`: A trait for reading registers.
//! - `CachedRegisters`: A caching wrapper around any `RegisterAccessor`.
//! - `RegisterSnapshot`: An in-memory register file that can be loaded from and saved to JSON.
mod cache;
mod snapshot;

pub use self::cache::{CacheStats, CachedRegisters};
pub use self::snapshot::{RegisterSnapshot, SnapshotError};

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// PCI location of one memory-controller node.
///
/// The function number is not part of the device; each decoding stage picks the
/// function it needs (1: address map, 2: DRAM controller, 3: miscellaneous control).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PciDevice {
    /// PCI domain (segment)
    pub domain: u16,
    /// PCI bus
    pub bus: u8,
    /// PCI slot (device number)
    pub slot: u8,
}

impl PciDevice {
    /// Creates a new device location.
    pub fn new(domain: u16, bus: u8, slot: u8) -> Self {
        PciDevice { domain, bus, slot }
    }

    /// Returns the address of register `offset` in configuration function `function`.
    pub fn register(&self, function: u8, offset: u16) -> RegisterAddr {
        RegisterAddr {
            device: *self,
            function,
            offset,
        }
    }
}

impl Display for PciDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:02x}:{:02x}", self.domain, self.bus, self.slot)
    }
}

/// Address of a single 32-bit PCI configuration register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterAddr {
    /// Device the register belongs to
    pub device: PciDevice,
    /// Configuration function
    pub function: u8,
    /// Byte offset into the configuration space
    pub offset: u16,
}

impl Display for RegisterAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:x}@{:#05x}", self.device, self.function, self.offset)
    }
}

/// Errors that can occur while reading a configuration register.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The underlying transport failed (missing device file, seek failure, short read)
    #[error("failed to read register {addr}: {source}")]
    Io {
        /// Register that was read
        addr: RegisterAddr,
        /// Transport error
        #[source]
        source: std::io::Error,
    },
    /// The register is not part of an in-memory snapshot
    #[error("register {addr} is not present in the snapshot")]
    Missing {
        /// Register that was read
        addr: RegisterAddr,
    },
}

impl RegisterError {
    /// Returns the register whose read failed.
    pub fn addr(&self) -> RegisterAddr {
        match self {
            RegisterError::Io { addr, .. } | RegisterError::Missing { addr } => *addr,
        }
    }
}

/// Trait for reading PCI configuration registers.
///
/// Implementors may cache values; register contents are assumed to be stable after boot.
/// Reads take `&mut self` so that caching implementations can update their state.
pub trait RegisterAccessor {
    /// Reads the 32-bit register at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the register cannot be read.
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError>;
}

impl<T: RegisterAccessor + ?Sized> RegisterAccessor for &mut T {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        (**self).read_register(addr)
    }
}

impl<T: RegisterAccessor + ?Sized> RegisterAccessor for Box<T> {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        (**self).read_register(addr)
    }
}

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use dramloc_core::pci::{RegisterAccessor, RegisterAddr, RegisterError};
use log::trace;

/// Directory holding one entry per PCI function
pub const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// Register accessor reading `<root>/DDDD:BB:SS.F/config`.
///
/// Every read opens the config file, seeks to the register and reads four
/// little-endian bytes. Wrap it in a [`dramloc_core::pci::CachedRegisters`] to avoid
/// repeated I/O.
#[derive(Clone, Debug)]
pub struct SysfsRegisters {
    root: PathBuf,
}

impl Default for SysfsRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsRegisters {
    /// Reads registers below [`SYSFS_PCI_DEVICES`].
    pub fn new() -> Self {
        Self::with_root(SYSFS_PCI_DEVICES)
    }

    /// Reads registers below `root` instead of the sysfs PCI device directory.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        SysfsRegisters {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the config file holding `addr`.
    pub fn config_path(&self, addr: RegisterAddr) -> PathBuf {
        self.root.join(format!(
            "{:04x}:{:02x}:{:02x}.{:x}",
            addr.device.domain, addr.device.bus, addr.device.slot, addr.function
        ))
        .join("config")
    }
}

impl RegisterAccessor for SysfsRegisters {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        let path = self.config_path(addr);
        let mut buf = [0u8; 4];
        File::open(&path)
            .and_then(|mut file| {
                file.seek(SeekFrom::Start(addr.offset as u64))?;
                file.read_exact(&mut buf)
            })
            .map_err(|source| RegisterError::Io { addr, source })?;
        let value = u32::from_le_bytes(buf);
        trace!("register {} = {:#010x} ({})", addr, value, path.display());
        Ok(value)
    }
}

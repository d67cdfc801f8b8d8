use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{PciDevice, RegisterAccessor, RegisterAddr, RegisterError};

/// Errors that can occur when loading or saving a register snapshot.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SnapshotError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

/// One register value as stored in a snapshot file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SnapshotEntry {
    pub domain: u16,
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
    pub offset: u16,
    pub value: u32,
}

/// In-memory register file.
///
/// Used to replay a decode offline from register values captured on the target machine
/// (see [`super::CachedRegisters::snapshot`]), and to describe synthetic register states in tests.
/// Serialized as a JSON array of `{domain, bus, slot, function, offset, value}` objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SnapshotEntry>", into = "Vec<SnapshotEntry>")]
pub struct RegisterSnapshot {
    values: BTreeMap<RegisterAddr, u32>,
}

impl RegisterSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of a register, replacing any previous value.
    pub fn set(&mut self, addr: RegisterAddr, value: u32) {
        self.values.insert(addr, value);
    }

    /// Builder-style [`RegisterSnapshot::set`].
    pub fn with(mut self, addr: RegisterAddr, value: u32) -> Self {
        self.set(addr, value);
        self
    }

    /// Returns the value of a register, if present.
    pub fn get(&self, addr: RegisterAddr) -> Option<u32> {
        self.values.get(&addr).copied()
    }

    /// Returns the number of registers in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the snapshot holds no registers.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the distinct devices present in the snapshot, in ascending order.
    pub fn devices(&self) -> Vec<PciDevice> {
        let mut devices: Vec<PciDevice> = self.values.keys().map(|addr| addr.device).collect();
        devices.dedup();
        devices
    }

    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_jsonfile(filepath: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let file = File::open(filepath)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Writes the snapshot to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn to_jsonfile(&self, filepath: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let file = File::create(filepath)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

impl RegisterAccessor for RegisterSnapshot {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        self.get(addr).ok_or(RegisterError::Missing { addr })
    }
}

impl FromIterator<(RegisterAddr, u32)> for RegisterSnapshot {
    fn from_iter<T: IntoIterator<Item = (RegisterAddr, u32)>>(iter: T) -> Self {
        RegisterSnapshot {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<SnapshotEntry>> for RegisterSnapshot {
    fn from(entries: Vec<SnapshotEntry>) -> Self {
        entries
            .into_iter()
            .map(|e| {
                let device = PciDevice::new(e.domain, e.bus, e.slot);
                (device.register(e.function, e.offset), e.value)
            })
            .collect()
    }
}

impl From<RegisterSnapshot> for Vec<SnapshotEntry> {
    fn from(snapshot: RegisterSnapshot) -> Self {
        snapshot
            .values
            .into_iter()
            .map(|(addr, value)| SnapshotEntry {
                domain: addr.device.domain,
                bus: addr.device.bus,
                slot: addr.device.slot,
                function: addr.function,
                offset: addr.offset,
                value,
            })
            .collect()
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use dramloc_core::pci::PciDevice;
use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::SYSFS_PCI_DEVICES;

/// Errors that can occur while discovering memory-controller nodes.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The PCI device directory could not be listed
    #[error("failed to list {path}: {source}")]
    Io {
        /// Directory that was scanned
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// No device with the requested ids exists
    #[error("no PCI device {vendor:04x}:{device:04x} found")]
    NotFound {
        /// Requested vendor id
        vendor: u16,
        /// Requested device id
        device: u16,
    },
}

/// Lists the memory-controller nodes of this machine.
///
/// Scans [`SYSFS_PCI_DEVICES`] for functions with the given vendor and device id, see
/// [`discover_nodes_in`].
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or no device matches.
pub fn discover_nodes(vendor: u16, device: u16) -> Result<Vec<PciDevice>, DiscoveryError> {
    discover_nodes_in(SYSFS_PCI_DEVICES, vendor, device)
}

/// Lists the distinct devices below `root` that have a function with the given ids.
///
/// Entries are named `DDDD:BB:SS.F` and carry `vendor` and `device` files holding hex
/// ids (`0x1022`). Entries that cannot be parsed or read are skipped. The result is sorted
/// by domain, bus and slot, which is the order nodes are scanned in.
///
/// # Errors
///
/// Returns an error if `root` cannot be listed or no device matches.
pub fn discover_nodes_in(
    root: impl AsRef<Path>,
    vendor: u16,
    device: u16,
) -> Result<Vec<PciDevice>, DiscoveryError> {
    let root = root.as_ref();
    let entries = fs::read_dir(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let nodes = entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let dev = parse_function_name(&name.to_string_lossy())?;
            let path = entry.path();
            (read_id(&path.join("vendor")) == Some(vendor)
                && read_id(&path.join("device")) == Some(device))
            .then_some(dev)
        })
        .sorted()
        .dedup()
        .collect_vec();

    if nodes.is_empty() {
        return Err(DiscoveryError::NotFound { vendor, device });
    }
    info!(
        "Found {} memory-controller node(s): {}",
        nodes.len(),
        nodes.iter().join(", ")
    );
    Ok(nodes)
}

/// Parses `DDDD:BB:SS.F` into the device part.
fn parse_function_name(name: &str) -> Option<PciDevice> {
    let (domain, rest) = name.split_once(':')?;
    let (bus, rest) = rest.split_once(':')?;
    let (slot, function) = rest.split_once('.')?;
    u8::from_str_radix(function, 16).ok()?;
    Some(PciDevice::new(
        u16::from_str_radix(domain, 16).ok()?,
        u8::from_str_radix(bus, 16).ok()?,
        u8::from_str_radix(slot, 16).ok()?,
    ))
}

fn read_id(path: &Path) -> Option<u16> {
    let content = fs::read_to_string(path).ok()?;
    let id = content.trim();
    let id = id.strip_prefix("0x").unwrap_or(id);
    let parsed = u16::from_str_radix(id, 16).ok();
    if parsed.is_none() {
        debug!("ignoring malformed id {:?} in {}", content, path.display());
    }
    parsed
}

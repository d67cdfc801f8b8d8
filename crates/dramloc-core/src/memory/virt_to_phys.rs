use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use log::{debug, trace, warn};
use serde::Serialize;
use thiserror::Error;

use super::pagemap_entry::{PageMapEntry, VirtualPage};

#[repr(transparent)]
#[derive(Clone, Copy, Default, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Physical memory address.
///
/// A newtype wrapper around a physical address value.
pub struct PhysAddr(u64);

impl Debug for PhysAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("PhysAddr(0x{:02x})", self.0))
    }
}

impl Display for PhysAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#014x}", self.0)
    }
}

impl PhysAddr {
    /// Creates a new physical address.
    pub fn new(addr: u64) -> Self {
        PhysAddr(addr)
    }

    /// Returns the address as a u64.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<PhysAddr> for u64 {
    fn from(addr: PhysAddr) -> u64 {
        addr.0
    }
}

impl From<u64> for PhysAddr {
    fn from(addr: u64) -> PhysAddr {
        PhysAddr(addr)
    }
}

/// Trait for resolving virtual addresses to physical addresses.
///
/// Implementors provide methods to translate virtual memory addresses
/// to physical addresses using system interfaces like `/proc/{pid}/pagemap`.
pub trait VirtToPhysResolver {
    /// Errors that can occur during physical address resolution
    type Error;

    /// Translates a virtual address and returns the page it lies in.
    ///
    /// # Errors
    ///
    /// Returns an error if address translation fails.
    fn translate(&mut self, virt: u64) -> Result<(PhysAddr, VirtualPage), Self::Error>;

    /// Translates a virtual address to a physical address.
    ///
    /// # Errors
    ///
    /// Returns an error if address translation fails.
    fn get_phys(&mut self, virt: u64) -> Result<PhysAddr, Self::Error> {
        self.translate(virt).map(|(phys, _)| phys)
    }
}

/// Errors that can happen during pagemap lookups.
#[derive(Debug, Error)]
pub enum PageMapError {
    /// The pagemap file could not be opened
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path of the pagemap file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Seeking to or reading the entry failed (including short reads)
    #[error("failed to read pagemap entry of {virt:#x}: {source}")]
    Io {
        /// Virtual address being translated
        virt: u64,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The page is not present in RAM
    #[error("virtual address {virt:#x} is not backed by a present page (swapped: {swapped})")]
    NotFound {
        /// Virtual address being translated
        virt: u64,
        /// The page is swapped out
        swapped: bool,
    },
    /// The lookup page size is zero
    #[error("invalid page size {0}")]
    InvalidPageSize(u64),
}

/// Virtual to physical address translator reading pagemap entries from `file`.
///
/// Entry `n` (8 bytes, little-endian) describes the `n`-th virtual page of size
/// `page_size`. With the memo enabled, the last present page is remembered and reused for
/// addresses in the same virtual page until [`PageMapFile::invalidate`] is called.
pub struct PageMapFile<F> {
    file: F,
    page_size: u64,
    use_memo: bool,
    memo: Option<(u64, VirtualPage)>,
}

/// Virtual to physical address translator using Linux pagemap.
///
/// Uses `/proc/{pid}/pagemap` to translate virtual to physical addresses.
/// Requires root privileges to see page frame numbers.
pub type LinuxPageMap = PageMapFile<File>;

impl LinuxPageMap {
    /// Opens the pagemap of the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if `page_size` is zero or opening `/proc/self/pagemap` fails.
    pub fn for_current_process(page_size: u64) -> Result<LinuxPageMap, PageMapError> {
        Self::open(PathBuf::from("/proc/self/pagemap"), page_size)
    }

    /// Opens the pagemap of a specific process.
    ///
    /// # Arguments
    ///
    /// * `pid` - Process ID to open pagemap for
    /// * `page_size` - OS page size used to index the pagemap
    ///
    /// # Errors
    ///
    /// Returns an error if `page_size` is zero or opening the process pagemap fails.
    pub fn for_process(pid: u32, page_size: u64) -> Result<LinuxPageMap, PageMapError> {
        Self::open(PathBuf::from(format!("/proc/{}/pagemap", pid)), page_size)
    }

    fn open(path: PathBuf, page_size: u64) -> Result<LinuxPageMap, PageMapError> {
        if page_size == 0 {
            return Err(PageMapError::InvalidPageSize(page_size));
        }
        debug!("Opening {}", path.display());
        let file = File::open(&path).map_err(|source| PageMapError::Open { path, source })?;
        PageMapFile::<File>::new(file, page_size)
    }
}

impl<F: Read + Seek> PageMapFile<F> {
    /// Creates a translator reading entries from `file`.
    ///
    /// # Errors
    ///
    /// Returns [`PageMapError::InvalidPageSize`] if `page_size` is zero.
    pub fn new(file: F, page_size: u64) -> Result<Self, PageMapError> {
        if page_size == 0 {
            return Err(PageMapError::InvalidPageSize(page_size));
        }
        Ok(PageMapFile {
            file,
            page_size,
            use_memo: false,
            memo: None,
        })
    }

    /// Enables or disables the last-page memo.
    pub fn with_memo(mut self, use_memo: bool) -> Self {
        self.use_memo = use_memo;
        self
    }

    /// Forgets the memoized page, e.g. because it may have been swapped out.
    pub fn invalidate(&mut self) {
        self.memo = None;
    }

    /// Page size used to index the pagemap.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Reads the raw pagemap entry of the page containing `virt`.
    ///
    /// # Errors
    ///
    /// Returns [`PageMapError::Io`] if seeking or reading fails.
    pub fn read_entry(&mut self, virt: u64) -> Result<PageMapEntry, PageMapError> {
        let offset = (virt / self.page_size) * 8;
        trace!("pagemap entry of {:#x} at offset {:#x}", virt, offset);
        let mut buf = [0u8; 8];
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|source| PageMapError::Io { virt, source })?;
        Ok(PageMapEntry(u64::from_le_bytes(buf)))
    }
}

impl<F: Read + Seek> VirtToPhysResolver for PageMapFile<F> {
    type Error = PageMapError;

    fn translate(&mut self, virt: u64) -> Result<(PhysAddr, VirtualPage), Self::Error> {
        let index = virt / self.page_size;
        if self.use_memo {
            if let Some((memo_index, page)) = self.memo {
                if memo_index == index {
                    trace!("pagemap memo hit for {:#x}", virt);
                    return Ok((PhysAddr(page.physical(virt, self.page_size)), page));
                }
            }
        }

        let entry = self.read_entry(virt)?;
        let page = VirtualPage::new(virt, entry);
        if !page.present {
            return Err(PageMapError::NotFound {
                virt,
                swapped: page.swapped,
            });
        }
        if page.pfn == 0 {
            warn!(
                "Got invalid PFN 0 for virtual address 0x{:x}. Are we root?",
                virt
            );
        }
        if self.use_memo {
            self.memo = Some((index, page));
        }
        let phys = PhysAddr(page.physical(virt, self.page_size));
        debug!("virtual address {:#x} -> physical address {}", virt, phys);
        Ok((phys, page))
    }
}

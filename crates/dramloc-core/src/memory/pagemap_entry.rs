use serde::Serialize;
use std::fmt::{self, Debug, Formatter};

/// One 64-bit entry of `/proc/{pid}/pagemap`.
///
/// Bit layout:
///
/// | bits  | present page      | swapped page              |
/// |-------|-------------------|---------------------------|
/// | 0-54  | page frame number | 0-4 swap type, 5-54 offset|
/// | 55-60 | page shift        | page shift                |
/// | 61    | reserved          | reserved                  |
/// | 62    | swapped           | swapped                   |
/// | 63    | present           | present                   |
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageMapEntry(pub u64);

impl Debug for PageMapEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageMapEntry")
            .field("raw", &format_args!("{:#018x}", self.0))
            .field("present", &self.present())
            .field("swapped", &self.swapped())
            .field("page_shift", &self.page_shift())
            .finish()
    }
}

impl PageMapEntry {
    /// Returns the raw entry.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Page is present in RAM.
    pub fn present(&self) -> bool {
        self.0 >> 63 & 0x1 != 0
    }

    /// Page is swapped out.
    pub fn swapped(&self) -> bool {
        self.0 >> 62 & 0x1 != 0
    }

    /// Page frame number; only meaningful if the page is present.
    pub fn pfn(&self) -> u64 {
        self.0 & 0x7F_FFFF_FFFF_FFFF
    }

    /// Page shift (page size is `1 << page_shift`).
    pub fn page_shift(&self) -> u32 {
        (self.0 >> 55 & 0x3F) as u32
    }

    /// Page size as reported by the entry.
    pub fn page_size(&self) -> u64 {
        1 << self.page_shift()
    }

    /// Swap type; only meaningful if the page is swapped.
    pub fn swap_type(&self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// Swap offset; only meaningful if the page is swapped.
    pub fn swap_offset(&self) -> u64 {
        self.0 >> 5 & 0x3_FFFF_FFFF_FFFF
    }
}

/// A decoded pagemap entry together with the virtual page it describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VirtualPage {
    /// Virtual page number (`virt >> page_shift`)
    pub virtual_page: u64,
    /// Page frame number
    pub pfn: u64,
    /// Raw pagemap entry
    pub entry: u64,
    /// Page shift reported by the entry
    pub page_shift: u32,
    /// Page size reported by the entry
    pub page_size: u64,
    /// Page is present
    pub present: bool,
    /// Page is swapped out
    pub swapped: bool,
    /// Swap type
    pub swap_type: u8,
    /// Swap offset
    pub swap_offset: u64,
}

impl VirtualPage {
    /// Decodes `entry`, the pagemap entry of the page containing `virt`.
    pub fn new(virt: u64, entry: PageMapEntry) -> Self {
        VirtualPage {
            virtual_page: virt.checked_shr(entry.page_shift()).unwrap_or(0),
            pfn: entry.pfn(),
            entry: entry.raw(),
            page_shift: entry.page_shift(),
            page_size: entry.page_size(),
            present: entry.present(),
            swapped: entry.swapped(),
            swap_type: entry.swap_type(),
            swap_offset: entry.swap_offset(),
        }
    }

    /// Physical address of `virt`, which must lie in this page.
    ///
    /// `page_size` is the page size the entry was looked up with.
    pub fn physical(&self, virt: u64, page_size: u64) -> u64 {
        (self.pfn << self.page_shift) | (virt % page_size)
    }
}

/// Page shift value (12 bits) for 4KB pages
pub const PAGE_SHIFT: usize = 12;
/// Standard page size (4096 bytes)
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Number of physical address bits decoded by the northbridge
pub const PHYS_ADDR_BITS: u32 = 48;
/// First physical address that cannot be decoded
pub const PHYS_ADDR_LIMIT: u64 = 1 << PHYS_ADDR_BITS;

/// Start of the memory hoisted above the MMIO hole
pub const FOUR_GB: u64 = 1 << 32;

/// Maximum number of memory-controller nodes
pub const MAX_NODES: usize = 8;
/// Number of chip selects (ranks) per channel
pub const MAX_RANKS: u8 = 8;

/// PCI vendor id of AMD
pub const AMD_VENDOR_ID: u16 = 0x1022;
/// PCI device id of the family 10h address map function (function 1)
pub const FAM10H_ADDRESS_MAP_DEVICE_ID: u16 = 0x1201;

//! # dramloc
//!
//! dramloc translates virtual and physical addresses on AMD family 10h NUMA machines
//! to the DRAM location backing them: node, channel, rank, bank, row and column.
//!
//! ## Quickstart guide
//!
//! ```sh
//! cargo build --release
//! # decode 1 GB of physical memory in 64 MB steps
//! sudo target/release/virtual2dram --p2d --addr 0x0 --memsize 1GB --step 64MB
//! # translate a page of process 1234 down to DRAM
//! sudo target/release/virtual2dram --pid 1234 --addr 0x7f0000000000 --memsize 4KB --step 64B
//! ```
//!
//! Register values can be captured once with `--dump-registers regs.json` and replayed on
//! any machine with `--registers regs.json`.
//!
//! ## Modules
//!
//! - [`Registers`]: the register accessor selected on the command line.
//! - [`init_logging_with_progress`]: logging that coexists with progress bars.
//! - [`parse_addr`]: address parsing for the command line.
//! - [`walk_range`]: translation of every address in an [`AddressRange`].

mod walk;

pub use walk::{AddressRange, WalkSummary, walk_range};

use dramloc_core::pci::{
    CacheStats, CachedRegisters, RegisterAccessor, RegisterAddr, RegisterError, RegisterSnapshot,
};
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

/// Initializes `env_logger` behind a progress-bar aware log wrapper.
///
/// The default filter is `info`, or `debug` if `debug` is set; `RUST_LOG` overrides both.
pub fn init_logging_with_progress(debug: bool) -> anyhow::Result<MultiProgress> {
    let level = if debug { "debug" } else { "info" };
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).build();
    let progress = MultiProgress::new();
    LogWrapper::new(progress.clone(), logger).try_init()?;
    Ok(progress)
}

/// Parses a hexadecimal (`0x` prefix) or decimal address.
pub fn parse_addr(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or(s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", s, e))
}

/// Register accessor chosen at runtime, with or without a cache.
pub enum Registers {
    /// Every read goes to the transport
    Direct(Box<dyn RegisterAccessor>),
    /// Reads are cached
    Cached(CachedRegisters<Box<dyn RegisterAccessor>>),
}

impl Registers {
    /// Wraps `inner`, caching if `cached` is set.
    pub fn new(inner: Box<dyn RegisterAccessor>, cached: bool) -> Self {
        if cached {
            Registers::Cached(CachedRegisters::new(inner))
        } else {
            Registers::Direct(inner)
        }
    }

    /// Cache statistics, if caching.
    pub fn stats(&self) -> Option<CacheStats> {
        match self {
            Registers::Direct(_) => None,
            Registers::Cached(cache) => Some(cache.stats()),
        }
    }

    /// All registers read so far, if caching.
    pub fn snapshot(&self) -> Option<RegisterSnapshot> {
        match self {
            Registers::Direct(_) => None,
            Registers::Cached(cache) => Some(cache.snapshot()),
        }
    }
}

impl RegisterAccessor for Registers {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        match self {
            Registers::Direct(inner) => inner.read_register(addr),
            Registers::Cached(cache) => cache.read_register(addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Registers, parse_addr};
    use dramloc_core::pci::{PciDevice, RegisterAccessor, RegisterSnapshot};

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr("0x12345"), Ok(0x12345));
        assert_eq!(parse_addr("0XfF"), Ok(0xff));
        assert_eq!(parse_addr("4096"), Ok(4096));
        assert!(parse_addr("0xzz").is_err());
        assert!(parse_addr("-1").is_err());
    }

    #[test]
    fn test_registers_cache_selection() -> anyhow::Result<()> {
        let addr = PciDevice::new(0, 0, 0x18).register(2, 0x110);
        let snapshot = RegisterSnapshot::new().with(addr, 0x10);

        let mut direct = Registers::new(Box::new(snapshot.clone()), false);
        assert_eq!(direct.read_register(addr)?, 0x10);
        assert!(direct.stats().is_none());
        assert!(direct.snapshot().is_none());

        let mut cached = Registers::new(Box::new(snapshot), true);
        cached.read_register(addr)?;
        cached.read_register(addr)?;
        let stats = cached.stats().expect("cache is enabled");
        assert_eq!((stats.reads, stats.hits), (2, 1));
        assert_eq!(cached.snapshot().and_then(|s| s.get(addr)), Some(0x10));
        Ok(())
    }
}

use std::collections::HashMap;

use log::trace;
use serde::Serialize;

use super::{RegisterAccessor, RegisterAddr, RegisterError, RegisterSnapshot};

/// Read statistics of a [`CachedRegisters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of register reads requested
    pub reads: u64,
    /// Number of reads answered from the cache
    pub hits: u64,
}

impl CacheStats {
    /// Fraction of reads answered from the cache (0.0 if nothing was read yet).
    pub fn hit_rate(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.hits as f64 / self.reads as f64
    }
}

/// Register cache keyed by the full `(domain, bus, slot, function, offset)` tuple.
///
/// Every value is populated on first read and consulted before any further I/O.
/// The cache is never invalidated: northbridge configuration does not change after boot.
/// Distinct registers never share a slot, so no entry is ever evicted.
pub struct CachedRegisters<A> {
    inner: A,
    values: HashMap<RegisterAddr, u32>,
    stats: CacheStats,
}

impl<A> CachedRegisters<A> {
    /// Wraps `inner` with an empty cache.
    pub fn new(inner: A) -> Self {
        CachedRegisters {
            inner,
            values: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Returns the read statistics collected so far.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns the number of cached registers.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Exports all cached values as a snapshot, e.g. for offline replay.
    pub fn snapshot(&self) -> RegisterSnapshot {
        self.values.iter().map(|(&addr, &value)| (addr, value)).collect()
    }

    /// Returns the wrapped accessor.
    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: RegisterAccessor> RegisterAccessor for CachedRegisters<A> {
    fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
        self.stats.reads += 1;
        if let Some(&value) = self.values.get(&addr) {
            self.stats.hits += 1;
            trace!("register {} = {:#010x} (cached)", addr, value);
            return Ok(value);
        }
        let value = self.inner.read_register(addr)?;
        self.values.insert(addr, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::CachedRegisters;
    use crate::pci::{PciDevice, RegisterAccessor, RegisterAddr, RegisterError, RegisterSnapshot};

    /// Accessor that counts how often it is asked.
    struct Counting {
        snapshot: RegisterSnapshot,
        calls: usize,
    }

    impl RegisterAccessor for Counting {
        fn read_register(&mut self, addr: RegisterAddr) -> Result<u32, RegisterError> {
            self.calls += 1;
            self.snapshot.read_register(addr)
        }
    }

    #[test]
    fn test_cache_hits() {
        let dev = PciDevice::new(0, 0, 0x18);
        let a = dev.register(1, 0x40);
        let b = dev.register(2, 0x40);
        let mut snapshot = RegisterSnapshot::new();
        snapshot.set(a, 0x3);
        snapshot.set(b, 0x7);
        let mut cache = CachedRegisters::new(Counting {
            snapshot,
            calls: 0,
        });

        assert_eq!(cache.read_register(a).unwrap(), 0x3);
        assert_eq!(cache.read_register(a).unwrap(), 0x3);
        assert_eq!(cache.read_register(b).unwrap(), 0x7);
        assert_eq!(cache.read_register(a).unwrap(), 0x3);

        let stats = cache.stats();
        assert_eq!(stats.reads, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.into_inner().calls, 2);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let dev = PciDevice::new(0, 0, 0x19);
        let addr = dev.register(3, 0xB0);
        let mut cache = CachedRegisters::new(Counting {
            snapshot: RegisterSnapshot::new(),
            calls: 0,
        });
        assert!(cache.read_register(addr).is_err());
        assert!(cache.read_register(addr).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.into_inner().calls, 2);
    }

    #[test]
    fn test_cache_snapshot_export() {
        let dev = PciDevice::new(0, 0, 0x18);
        let addr = dev.register(2, 0x110);
        let mut cache = CachedRegisters::new(RegisterSnapshot::new().with(addr, 0x10));
        cache.read_register(addr).unwrap();
        let exported = cache.snapshot();
        assert_eq!(exported.get(addr), Some(0x10));
        assert_eq!(exported.len(), 1);
    }
}

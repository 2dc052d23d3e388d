use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct EngineStats {
    feed_pages: AtomicU64,
    feed_truncations: AtomicU64,
    rpc_calls: AtomicU64,
    rpc_failures: AtomicU64,
    cache_hits: AtomicU64,
    hydrated: AtomicU64,
    receipts_checked: AtomicU64,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineStats {
    pub const fn new() -> Self {
        Self {
            feed_pages: AtomicU64::new(0),
            feed_truncations: AtomicU64::new(0),
            rpc_calls: AtomicU64::new(0),
            rpc_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            hydrated: AtomicU64::new(0),
            receipts_checked: AtomicU64::new(0),
        }
    }

    pub fn inc_feed_pages(&self, n: u64) {
        self.feed_pages.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_feed_truncations(&self, n: u64) {
        self.feed_truncations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_rpc_calls(&self, n: u64) {
        self.rpc_calls.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_rpc_failures(&self, n: u64) {
        self.rpc_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self, n: u64) {
        self.cache_hits.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_hydrated(&self, n: u64) {
        self.hydrated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_receipts_checked(&self, n: u64) {
        self.receipts_checked.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            feed_pages: self.feed_pages.load(Ordering::Relaxed),
            feed_truncations: self.feed_truncations.load(Ordering::Relaxed),
            rpc_calls: self.rpc_calls.load(Ordering::Relaxed),
            rpc_failures: self.rpc_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            hydrated: self.hydrated.load(Ordering::Relaxed),
            receipts_checked: self.receipts_checked.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSnapshot {
    pub feed_pages: u64,
    pub feed_truncations: u64,
    pub rpc_calls: u64,
    pub rpc_failures: u64,
    pub cache_hits: u64,
    pub hydrated: u64,
    pub receipts_checked: u64,
}

pub static ENGINE_STATS: EngineStats = EngineStats::new();

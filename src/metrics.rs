use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Monotonically increasing counter
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge that can increase or decrease
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn add(&self, value: i64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn sub(&self, value: i64) {
        self.0.fetch_sub(value, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-cache metrics for observability and testing
///
/// Each cache instance has its own set of metrics, so multiple instances
/// (including the process-wide default) can be observed independently.
pub struct CacheMetrics {
    // Lookup outcomes
    pub hit: Counter,
    pub miss: Counter,
    /// Subset of misses where the entry was present but past its expiry
    pub miss_expired: Counter,

    // Insert outcomes
    pub insert: Counter,
    /// Key or value over the fixed bounds; the request was ignored
    pub insert_rejected: Counter,
    /// Entry larger than an empty buffer's usable area; silently dropped
    pub insert_dropped: Counter,

    // Arena maintenance
    pub evict: Counter,
    pub rotation: Counter,
    pub resize: Counter,

    /// Cumulative bytes written to the arena (motion)
    pub bytes_written: Counter,
    /// Bytes currently occupied by the two entry regions
    pub bytes_live: Gauge,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hit: Counter::new(),
            miss: Counter::new(),
            miss_expired: Counter::new(),
            insert: Counter::new(),
            insert_rejected: Counter::new(),
            insert_dropped: Counter::new(),
            evict: Counter::new(),
            rotation: Counter::new(),
            resize: Counter::new(),
            bytes_written: Counter::new(),
            bytes_live: Gauge::new(),
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clocksource::coarse::UnixInstant;

/// Time source injected into a cache instance.
///
/// The engine reads the clock once per `get` and once per `set`; expiry
/// timestamps and cycle timing both derive from it, so substituting a
/// manual implementation makes TTL and resize behavior fully
/// deterministic in tests.
pub trait Clock: Send {
    /// Current time in whole seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Default clock backed by the coarse system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        UnixInstant::now()
            .duration_since(UnixInstant::EPOCH)
            .as_secs() as u64
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same underlying instant, so a test can keep one
/// handle and hand another to the cache:
///
/// ```
/// use rotocache::{CacheBuilder, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let mut cache = CacheBuilder::new().clock(clock.clone()).build().unwrap();
/// cache.set(b"k", b"v", 60);
/// clock.advance(61);
/// assert!(cache.get(b"k").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

//! Process-wide default cache instance.
//!
//! A convenience facade over a single implicit [`Cache`] for hosts that
//! want exactly one resolver cache without threading a handle through
//! every call site. The instance is created by the first [`init`] and
//! lives for the rest of the process; every operation before that is a
//! no-op returning a miss.
//!
//! The facade serializes access behind a mutex, and [`get`] copies the
//! value out since a borrow cannot escape the lock. Code that wants
//! zero-copy reads or several independent caches should own explicit
//! [`Cache`] handles instead.

use parking_lot::Mutex;

use crate::{Cache, CacheBuilder, InitError, Options};

static DEFAULT: Mutex<Option<Cache>> = Mutex::new(None);

/// Create the default instance with a `cachesize`-byte arena, or
/// reinitialize it if it already exists.
pub fn init(cachesize: u32, options: Option<Options>) -> Result<(), InitError> {
    let mut slot = DEFAULT.lock();
    match slot.as_mut() {
        Some(cache) => cache.init(cachesize, options),
        None => {
            let cache = CacheBuilder::new()
                .size(cachesize)
                .options(options.unwrap_or_default())
                .build()?;
            *slot = Some(cache);
            Ok(())
        }
    }
}

/// Look up `key` in the default instance, returning the value and its
/// remaining TTL in seconds. `None` before [`init`].
pub fn get(key: &[u8]) -> Option<(Vec<u8>, u32)> {
    let guard = DEFAULT.lock();
    let cache = guard.as_ref()?;
    let hit = cache.get(key)?;
    Some((hit.value().to_vec(), hit.ttl()))
}

/// Insert into the default instance. A no-op before [`init`].
pub fn set(key: &[u8], data: &[u8], ttl: u32) {
    if let Some(cache) = DEFAULT.lock().as_mut() {
        cache.set(key, data, ttl);
    }
}

/// Replace the default instance's options wholesale. A no-op before
/// [`init`].
pub fn set_options(options: Options) {
    if let Some(cache) = DEFAULT.lock().as_mut() {
        cache.set_options(options);
    }
}

/// Cumulative bytes the default instance has written to its arena; 0
/// before [`init`].
pub fn motion() -> u64 {
    DEFAULT.lock().as_ref().map(Cache::motion).unwrap_or(0)
}

//! Fixed-budget, in-memory TTL cache over opaque byte keys and values.
//!
//! All state lives in a single contiguous arena: a hash index at the low
//! end, two packed entry regions, and free space between them. Eviction
//! is FIFO by buffer rotation rather than per-entry bookkeeping, and an
//! adaptive controller resizes the arena to hit a target rotation cycle
//! time. Built for resolver-style workloads: huge working sets, cheap
//! entries, predictable eviction.

mod arena;
mod clock;
mod cycle;
mod entry;
mod hashtable;

pub mod global;
pub(crate) mod metrics;


use std::fmt;

use arena::Arena;
use cycle::CycleState;
use entry::EntryView;
use hashtable::ChainCursor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cycle::TtlStats;
pub use metrics::CacheMetrics;

/// Maximum key length in bytes; longer keys are ignored by `set` and miss in `get`.
pub const MAX_KEY_LEN: usize = 1000;
/// Maximum value length in bytes; larger values are ignored by `set`.
pub const MAX_DATA_LEN: usize = 1_000_000;
/// Smallest allowed arena size; requested sizes are clamped up to this.
pub const MIN_CACHE_SIZE: u32 = 100;
/// Largest allowed arena size; requested sizes are clamped down to this.
pub const MAX_CACHE_SIZE: u32 = 1_000_000_000;
/// TTLs are clamped to this many seconds (7 days) on insertion and lookup.
pub const MAX_TTL: u32 = 604_800;
/// Lookup gives up after this many chain steps to blunt hash flooding.
pub const MAX_CHAIN_STEPS: u32 = 100;

/// Default desired wall-clock seconds between rotations (24 hours).
pub const DEFAULT_TARGET_CYCLE_TIME: u64 = 86_400;

const DEFAULT_CACHE_SIZE: u32 = 1_000_000;

/// Error type for cache construction and reinitialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The arena allocation failed; any prior cache state is intact
    Allocation,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Allocation => f.write_str("cache arena allocation failed"),
        }
    }
}

impl std::error::Error for InitError {}

/// Error returned when a structural invariant check fails.
///
/// Produced by [`Cache::check_invariants`]; carries a description of the
/// first violated invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

/// Snapshot handed to the resize callback at each cycle rotation.
#[derive(Debug, Clone, Copy)]
pub struct ResizeEvent {
    /// `target_cycle_time / observed_cycle_time` for the cycle that just ended
    pub ratio: f64,
    /// Arena size in bytes going into the decision
    pub current_size: u32,
    /// Size the controller would reinitialize to
    pub proposed_size: u32,
    /// TTL statistics of the entries inserted during the cycle
    pub ttl: TtlStats,
    /// The controller's provisional decision; the callback's return value
    /// replaces it
    pub resize: bool,
}

/// Policy and observability hook invoked once per rotation; returns the
/// final resize decision.
pub type ResizeCallback = Box<dyn FnMut(&ResizeEvent) -> bool + Send>;

/// Cache configuration carried by an instance.
///
/// Replaced wholesale by [`Cache::set_options`]; there are no partial
/// updates.
pub struct Options {
    /// Allow the cycle controller to reinitialize the arena at a new size
    pub allow_resize: bool,
    /// Desired wall-clock seconds between rotations
    pub target_cycle_time: u64,
    /// Final say on each rotation's resize decision
    pub resize_callback: Option<ResizeCallback>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_resize: true,
            target_cycle_time: DEFAULT_TARGET_CYCLE_TIME,
            resize_callback: None,
        }
    }
}

/// A successful lookup.
///
/// The value borrows the arena, so the compiler enforces the contract
/// that it is only valid until the next mutating call; copy it out if it
/// must outlive the next `set`.
pub struct Hit<'a> {
    value: &'a [u8],
    ttl: u32,
}

impl<'a> Hit<'a> {
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Remaining time to live in seconds, clamped to [`MAX_TTL`].
    pub fn ttl(&self) -> u32 {
        self.ttl
    }
}

enum Room {
    Ready,
    TooLarge,
    Reinitialized,
}

/// Builder for constructing a [`Cache`] with custom configuration
pub struct CacheBuilder {
    size: u32,
    options: Options,
    clock: Box<dyn Clock>,
}

impl CacheBuilder {
    /// Create a new builder with default settings: a 1 MB arena,
    /// resizing enabled with a 24-hour target cycle, the system clock.
    pub fn new() -> Self {
        Self {
            size: DEFAULT_CACHE_SIZE,
            options: Options::default(),
            clock: Box::new(SystemClock),
        }
    }

    /// Set the arena size in bytes.
    ///
    /// Clamped to `[MIN_CACHE_SIZE, MAX_CACHE_SIZE]` at build time. The
    /// hash index takes the largest power of two no larger than a 32nd
    /// of this; the rest holds entries.
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Enable or disable adaptive resizing (default: enabled).
    pub fn allow_resize(mut self, allow: bool) -> Self {
        self.options.allow_resize = allow;
        self
    }

    /// Set the desired wall-clock seconds between rotations (default 86400).
    pub fn target_cycle_time(mut self, seconds: u64) -> Self {
        self.options.target_cycle_time = seconds;
        self
    }

    /// Install a hook with the final say on each rotation's resize
    /// decision. Called at most once per rotation.
    pub fn resize_callback(
        mut self,
        callback: impl FnMut(&ResizeEvent) -> bool + Send + 'static,
    ) -> Self {
        self.options.resize_callback = Some(Box::new(callback));
        self
    }

    /// Replace the whole options struct at once.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Substitute the time source (default: [`SystemClock`]).
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Build the cache, allocating its arena.
    pub fn build(self) -> Result<Cache, InitError> {
        let size = self.size.clamp(MIN_CACHE_SIZE, MAX_CACHE_SIZE);
        let arena = Arena::allocate(size)?;
        let hsize = hashtable::index_size_for(size);
        let now = self.clock.now();
        Ok(Cache {
            arena,
            hsize,
            writer: hsize,
            oldest: size,
            unused: size,
            cycle: CycleState::new(now),
            options: self.options,
            clock: self.clock,
            metrics: CacheMetrics::new(),
        })
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A rotating-arena TTL cache.
///
/// Single-threaded: `set` and `init` take `&mut self`, `get` takes
/// `&self`, and a returned [`Hit`] borrows the arena until dropped. Wrap
/// the instance in a mutex (as [`global`] does) to share it.
///
/// ```
/// use rotocache::Cache;
///
/// let mut cache = Cache::new(100_000).unwrap();
/// cache.set(b"example.com", b"93.184.216.34", 300);
/// let hit = cache.get(b"example.com").unwrap();
/// assert_eq!(hit.value(), b"93.184.216.34");
/// assert!(hit.ttl() <= 300);
/// ```
pub struct Cache {
    arena: Arena,
    hsize: u32,
    writer: u32,
    oldest: u32,
    unused: u32,
    cycle: CycleState,
    options: Options,
    clock: Box<dyn Clock>,
    metrics: CacheMetrics,
}

impl Cache {
    /// Create a cache with a `cachesize`-byte arena and default options.
    ///
    /// For custom configuration use [`CacheBuilder`].
    pub fn new(cachesize: u32) -> Result<Self, InitError> {
        CacheBuilder::new().size(cachesize).build()
    }

    /// Reinitialize in place: discard every entry, reallocate the arena
    /// at `cachesize`, reset cursors and cycle state.
    ///
    /// The new buffer is allocated before the old one is dropped, so on
    /// `Err` the prior state is untouched and the cache remains usable.
    /// `options` of `None` resets the options to their defaults.
    pub fn init(&mut self, cachesize: u32, options: Option<Options>) -> Result<(), InitError> {
        let now = self.clock.now();
        self.reset(cachesize, now)?;
        self.options = options.unwrap_or_default();
        Ok(())
    }

    /// Replace the options struct wholesale.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Look up `key`, reading the injected clock for the current time.
    pub fn get(&self, key: &[u8]) -> Option<Hit<'_>> {
        self.get_at(key, self.clock.now())
    }

    /// Look up `key` as of `now` (seconds since the epoch), substituting
    /// for a clock read.
    ///
    /// Walks the key's collision chain from newest to oldest, so a
    /// duplicate key always resolves to its most recent entry. An entry
    /// past its expiry is reported as a miss but not removed; it ages
    /// out with its region. Lookups never mutate the cache.
    pub fn get_at(&self, key: &[u8], now: u64) -> Option<Hit<'_>> {
        if key.len() > MAX_KEY_LEN {
            return None;
        }
        let keylen = key.len() as u32;

        let mut cursor = ChainCursor::start(&self.arena, hashtable::bucket(key, self.hsize));
        let mut steps = 0u32;
        while cursor.pos() != 0 {
            let entry = EntryView::at(&self.arena, cursor.pos());
            if entry.key_len() == keylen && entry.key() == key {
                let expire = entry.expire();
                if expire < now {
                    self.metrics.miss_expired.increment();
                    self.metrics.miss.increment();
                    return None;
                }
                let ttl = (expire - now).min(MAX_TTL as u64) as u32;
                self.metrics.hit.increment();
                return Some(Hit {
                    value: entry.value(),
                    ttl,
                });
            }
            cursor.advance(&self.arena);
            steps += 1;
            if steps > MAX_CHAIN_STEPS {
                self.metrics.miss.increment();
                return None;
            }
        }
        self.metrics.miss.increment();
        None
    }

    /// Insert `data` under `key` with a time to live of `ttl` seconds.
    ///
    /// Silently ignores keys over [`MAX_KEY_LEN`], values over
    /// [`MAX_DATA_LEN`], and entries larger than an empty buffer's
    /// usable area; clamps `ttl` to [`MAX_TTL`]. Evicts aged entries in
    /// FIFO order, rotating the buffer as needed, until the entry fits.
    /// A prior entry under the same key is neither removed nor updated;
    /// the new entry shadows it until both age out.
    pub fn set(&mut self, key: &[u8], data: &[u8], ttl: u32) {
        if key.len() > MAX_KEY_LEN || data.len() > MAX_DATA_LEN {
            self.metrics.insert_rejected.increment();
            return;
        }
        let ttl = ttl.min(MAX_TTL);
        let entry_len = entry::HEADER_LEN + key.len() as u32 + data.len() as u32;
        let now = self.clock.now();

        loop {
            match self.make_room(entry_len, now) {
                Room::Ready => break,
                Room::TooLarge => {
                    self.metrics.insert_dropped.increment();
                    return;
                }
                // A resize emptied and reallocated the arena; re-check the
                // fit against the fresh geometry.
                Room::Reinitialized => continue,
            }
        }

        let h = hashtable::bucket(key, self.hsize);
        let old_head = self.arena.get4(h);
        if old_head != 0 {
            // The previous newest entry gains the new entry as its
            // head-side neighbor in place of the head slot.
            let link = self.arena.get4(old_head);
            self.arena.set4(old_head, link ^ h ^ self.writer);
        }
        entry::write(
            &mut self.arena,
            self.writer,
            old_head ^ h,
            key,
            data,
            now + ttl as u64,
        );
        self.arena.set4(h, self.writer);
        self.writer += entry_len;

        self.cycle.ttl.record(ttl);
        self.metrics.insert.increment();
        self.metrics.bytes_written.add(entry_len as u64);
        self.metrics.bytes_live.add(entry_len as i64);
    }

    /// Free space until `entry_len` bytes fit between writer and oldest.
    fn make_room(&mut self, entry_len: u32, now: u64) -> Room {
        while self.writer + entry_len > self.oldest {
            if self.oldest == self.unused {
                if self.writer <= self.hsize {
                    // Empty buffer and the request still does not fit.
                    return Room::TooLarge;
                }
                if self.end_cycle(now) {
                    return Room::Reinitialized;
                }
                // Rotate: freeze the active region as the new aged
                // region and restart the writer at the top of the index.
                self.metrics.rotation.increment();
                self.unused = self.writer;
                self.oldest = self.hsize;
                self.writer = self.hsize;
            } else {
                self.evict_oldest();
            }
        }
        Room::Ready
    }

    /// Evict the entry at the head of the aged region.
    fn evict_oldest(&mut self) {
        let pos = self.oldest;
        let entry = EntryView::at(&self.arena, pos);
        let neighbor = entry.link();
        let entry_len = entry.total_len();

        // The evicted entry is the tail of its chain, so its XOR link is
        // exactly the position of its sole remaining neighbor: the head
        // slot when it is alone in its bucket, the second-oldest entry
        // otherwise. XOR-ing the tail's position out of that neighbor's
        // link (or head slot) detaches it.
        debug_assert!(
            neighbor < self.hsize
                || (self.hsize..self.writer).contains(&neighbor)
                || (self.oldest..self.unused).contains(&neighbor),
            "aged tail's link must name its head slot or a live entry"
        );
        let link = self.arena.get4(neighbor);
        self.arena.set4(neighbor, link ^ pos);

        let next = pos as u64 + entry_len;
        if next > self.unused as u64 {
            arena::corruption("aged entry overruns the aged region");
        }
        self.oldest = next as u32;
        self.metrics.evict.increment();
        self.metrics.bytes_live.sub(entry_len as i64);

        if self.oldest == self.unused {
            // Aged region drained; park both cursors at the end so the
            // next pass rotates.
            self.unused = self.arena.len();
            self.oldest = self.arena.len();
        }
    }

    /// Close out the cycle that just filled the buffer. Returns true if
    /// the controller reinitialized the cache at a new size.
    fn end_cycle(&mut self, now: u64) -> bool {
        let elapsed = now.saturating_sub(self.cycle.start);
        let mut reinitialized = false;

        if self.options.allow_resize && elapsed > 0 {
            let proposal = cycle::propose(
                self.arena.len(),
                self.options.target_cycle_time,
                elapsed as f64,
                self.cycle.last_ratio,
            );
            let mut resize = proposal.resize;
            if let Some(callback) = self.options.resize_callback.as_mut() {
                let event = ResizeEvent {
                    ratio: proposal.ratio,
                    current_size: self.arena.len(),
                    proposed_size: proposal.newsize,
                    ttl: self.cycle.ttl,
                    resize,
                };
                resize = callback(&event);
            }
            self.cycle.last_ratio = proposal.ratio;

            if resize {
                self.cycle.last_ratio = 0.0;
                let old_size = self.arena.len();
                match self.reset(proposal.newsize, now) {
                    Ok(()) => {
                        log::info!("cache resized from {} to {}", old_size, proposal.newsize);
                        self.metrics.resize.increment();
                        reinitialized = true;
                    }
                    Err(_) => {
                        // Allocation precedes free, so the current arena
                        // is still intact; carry on at the old size.
                        log::warn!(
                            "cache resize from {} to {} failed, keeping current arena",
                            old_size,
                            proposal.newsize
                        );
                    }
                }
            }
        }

        if !reinitialized {
            self.cycle.start = now;
            self.cycle.ttl.clear();
        }
        reinitialized
    }

    /// Reallocate at `cachesize` and reset all cursors and cycle state.
    /// Options are left untouched. On `Err` nothing has changed.
    fn reset(&mut self, cachesize: u32, now: u64) -> Result<(), InitError> {
        let size = cachesize.clamp(MIN_CACHE_SIZE, MAX_CACHE_SIZE);
        let arena = Arena::allocate(size)?;
        self.arena = arena;
        self.hsize = hashtable::index_size_for(size);
        self.writer = self.hsize;
        self.oldest = size;
        self.unused = size;
        self.cycle = CycleState::new(now);
        self.metrics.bytes_live.set(0);
        Ok(())
    }

    /// Arena size in bytes.
    pub fn size(&self) -> u32 {
        self.arena.len()
    }

    /// Hash index size in bytes (`index_size() / 4` bucket head slots).
    pub fn index_size(&self) -> u32 {
        self.hsize
    }

    /// Cumulative bytes written to the arena over the cache's lifetime.
    pub fn motion(&self) -> u64 {
        self.metrics.bytes_written.value()
    }

    /// Get a reference to the cache metrics
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Walk every collision chain and validate the structural
    /// invariants: cursor ordering, chain termination, entry placement
    /// within the two entry regions, and bucket membership.
    ///
    /// Intended for tests and debugging; cost is linear in the number of
    /// live entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let size = self.arena.len();
        if !(self.hsize <= self.writer
            && self.writer <= self.oldest
            && self.oldest <= self.unused
            && self.unused <= size)
        {
            return Err(InvariantError::new(format!(
                "cursor ordering violated: hsize={} writer={} oldest={} unused={} size={}",
                self.hsize, self.writer, self.oldest, self.unused, size
            )));
        }
        if self.oldest == self.unused && self.unused != size {
            return Err(InvariantError::new(format!(
                "empty aged region not parked at the end: oldest=unused={} size={}",
                self.unused, size
            )));
        }

        // An entry occupies at least a header, bounding the chain length.
        let max_steps = (size - self.hsize) / entry::HEADER_LEN + 1;

        let mut slot = 0u32;
        while slot < self.hsize {
            let mut cursor = ChainCursor::start(&self.arena, slot);
            let mut steps = 0u32;
            while cursor.pos() != 0 {
                let pos = cursor.pos();
                let entry = EntryView::at(&self.arena, pos);
                let end = pos as u64 + entry.total_len();
                let in_active = pos >= self.hsize && end <= self.writer as u64;
                let in_aged = pos >= self.oldest && end <= self.unused as u64;
                if !(in_active || in_aged) {
                    return Err(InvariantError::new(format!(
                        "entry at {pos} lies outside the entry regions"
                    )));
                }
                if hashtable::bucket(entry.key(), self.hsize) != slot {
                    return Err(InvariantError::new(format!(
                        "entry at {pos} is chained under the wrong bucket"
                    )));
                }
                steps += 1;
                if steps > max_steps {
                    return Err(InvariantError::new(format!(
                        "chain at slot {slot} does not terminate"
                    )));
                }
                cursor.advance(&self.arena);
            }
            slot += 4;
        }
        Ok(())
    }
}

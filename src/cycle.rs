use crate::{MAX_CACHE_SIZE, MIN_CACHE_SIZE};

/// TTL statistics for the entries inserted during one cycle.
///
/// Handed to the resize callback at each rotation so policy code can see
/// what the evicted era looked like. `min`/`max` are 0 until the first
/// entry of the cycle is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlStats {
    pub count: u64,
    pub total: u64,
    pub min: u32,
    pub max: u32,
}

impl TtlStats {
    pub(crate) fn record(&mut self, ttl: u32) {
        self.count += 1;
        self.total += ttl as u64;
        if self.max == 0 || ttl > self.max {
            self.max = ttl;
        }
        if self.min == 0 || ttl < self.min {
            self.min = ttl;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Rotation-cycle state: when the current cycle started, the previous
/// cycle's target/observed ratio (0 when no prior cycle has been
/// recorded), and the running TTL statistics.
pub(crate) struct CycleState {
    pub start: u64,
    pub last_ratio: f64,
    pub ttl: TtlStats,
}

impl CycleState {
    pub fn new(now: u64) -> Self {
        Self {
            start: now,
            last_ratio: 0.0,
            ttl: TtlStats::default(),
        }
    }
}

/// What the controller proposes for a finished cycle.
pub(crate) struct Proposal {
    pub ratio: f64,
    pub newsize: u32,
    pub resize: bool,
}

/// Size the next arena from how fast the last cycle completed.
///
/// `ratio > 1` means the buffer filled faster than the target cycle time
/// (too small), `ratio < 1` slower (too big). The proposed size carries
/// 10% headroom so the next cycle lands inside the target. A resize is
/// only proposed when two consecutive cycles agree on the direction,
/// filtering transient bursts; growth needs both ratios above 1, shrink
/// needs both below 0.5.
pub(crate) fn propose(size: u32, target_cycle_time: u64, elapsed: f64, last_ratio: f64) -> Proposal {
    let ratio = target_cycle_time as f64 / elapsed;

    let mut newsize = size as f64 * ratio * 1.1;
    if newsize > MAX_CACHE_SIZE as f64 {
        newsize = MAX_CACHE_SIZE as f64;
    }
    if newsize < MIN_CACHE_SIZE as f64 {
        newsize = MIN_CACHE_SIZE as f64;
    }

    let resize = last_ratio != 0.0
        && ((ratio > 1.0 && last_ratio > 1.0 && size < MAX_CACHE_SIZE)
            || (ratio < 0.5 && last_ratio < 0.5 && size > MIN_CACHE_SIZE));

    Proposal {
        ratio,
        newsize: newsize as u32,
        resize,
    }
}

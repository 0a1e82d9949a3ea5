//! Adaptive resizing driven end to end with a manual clock: the
//! controller only acts when two consecutive cycles agree, the callback
//! has the final say, and a resize reinitializes the arena.

use std::sync::{Arc, Mutex};

use rotocache::{CacheBuilder, ManualClock};

fn key(i: u32) -> String {
    format!("k{:07}", i)
}

/// Insert 36-byte entries until `stop` reports the boundary we drove for.
fn fill_until(cache: &mut rotocache::Cache, i: &mut u32, limit: u32, stop: impl Fn(&rotocache::Cache) -> bool) {
    while !stop(cache) {
        cache.set(key(*i).as_bytes(), b"12345678", 3_600);
        *i += 1;
        assert!(*i < limit, "boundary never reached");
    }
}

#[test]
fn two_fast_cycles_grow_the_arena() {
    let clock = ManualClock::new(0);
    let mut cache = CacheBuilder::new()
        .size(1_000)
        .target_cycle_time(10)
        .clock(clock.clone())
        .build()
        .unwrap();

    // first cycle completes in 2s (ratio 5): fast, but a single fast
    // cycle is not enough evidence to resize
    clock.set(2);
    let mut i = 0;
    fill_until(&mut cache, &mut i, 100, |c| c.metrics().rotation.value() == 1);
    assert_eq!(cache.metrics().resize.value(), 0);
    assert_eq!(cache.size(), 1_000);

    // second consecutive 2s cycle: grow to size * ratio * 1.1
    clock.set(4);
    fill_until(&mut cache, &mut i, 300, |c| c.metrics().resize.value() == 1);
    assert_eq!(cache.size(), 5_500);
    assert_eq!(cache.index_size(), 128);
    cache.check_invariants().unwrap();

    // the reinitialized cache is empty except for the insert that
    // triggered the resize, which was retried against the fresh arena
    let trigger = key(i - 1);
    assert!(cache.get(trigger.as_bytes()).is_some());
    for j in 0..i - 1 {
        assert!(cache.get(key(j).as_bytes()).is_none());
    }
}

#[test]
fn two_slow_cycles_shrink_the_arena() {
    let clock = ManualClock::new(0);
    let mut cache = CacheBuilder::new()
        .size(2_000)
        .target_cycle_time(10)
        .clock(clock.clone())
        .build()
        .unwrap();

    // both cycles take 40s against a 10s target (ratio 0.25)
    clock.set(40);
    let mut i = 0;
    fill_until(&mut cache, &mut i, 200, |c| c.metrics().rotation.value() == 1);
    assert_eq!(cache.size(), 2_000);

    clock.set(80);
    fill_until(&mut cache, &mut i, 500, |c| c.metrics().resize.value() == 1);
    assert_eq!(cache.size(), 550);
    cache.check_invariants().unwrap();
}

#[test]
fn callback_veto_blocks_resizing_but_still_sees_ratios() {
    let ratios: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&ratios);

    let clock = ManualClock::new(0);
    let mut cache = CacheBuilder::new()
        .size(1_000)
        .target_cycle_time(10)
        .resize_callback(move |event| {
            observed.lock().unwrap().push(event.ratio);
            false
        })
        .clock(clock.clone())
        .build()
        .unwrap();

    clock.set(2);
    let mut i = 0;
    fill_until(&mut cache, &mut i, 100, |c| c.metrics().rotation.value() == 1);
    clock.set(4);
    fill_until(&mut cache, &mut i, 300, |c| c.metrics().rotation.value() == 2);

    // two fast cycles in a row would have grown the cache
    assert_eq!(cache.metrics().resize.value(), 0);
    assert_eq!(cache.size(), 1_000);
    assert_eq!(*ratios.lock().unwrap(), vec![5.0, 5.0]);
}

#[test]
fn callback_can_force_a_resize_on_the_first_cycle() {
    let events: Arc<Mutex<Vec<(u32, u32, bool, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&events);

    let clock = ManualClock::new(0);
    let mut cache = CacheBuilder::new()
        .size(1_000)
        .target_cycle_time(10)
        .resize_callback(move |event| {
            observed.lock().unwrap().push((
                event.current_size,
                event.proposed_size,
                event.resize,
                event.ttl.count,
            ));
            true
        })
        .clock(clock.clone())
        .build()
        .unwrap();

    clock.set(2);
    let mut i = 0;
    fill_until(&mut cache, &mut i, 100, |c| c.metrics().resize.value() == 1);
    assert_eq!(cache.size(), 5_500);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let (old_size, proposed, provisional, inserted) = events[0];
    assert_eq!(old_size, 1_000);
    assert_eq!(proposed, 5_500);
    // one fast cycle on its own would not have resized
    assert!(!provisional);
    // the cycle's TTL stats cover every insert of the cycle
    assert_eq!(inserted as u32, i - 1);
}

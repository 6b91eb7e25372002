// Growth triggers observed through MapStats.
use bucket_map::{BucketMap, MapStats};
use std::cell::Cell;

// Test: constant turnover at a steady size fragments chains until a
// same-size growth compacts them; the exponent never changes.
#[test]
fn churn_at_steady_size_triggers_same_size_growth() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut m: BucketMap<u32, ()> = BucketMap::with_capacity(48);
    assert_eq!(m.stats().exponent, 3);
    let mut saw_same_size = false;
    for k in 0..20_000u32 {
        m.insert(k, ());
        if k >= 48 {
            m.remove(&(k - 48));
        }
        saw_same_size |= m.stats().same_size_grow;
    }
    assert!(saw_same_size);
    assert_eq!(m.stats().exponent, 3);
    assert_eq!(m.len(), 48);
    for k in 19_952..20_000u32 {
        assert!(m.contains_key(&k));
    }
}

// Test: overwrites never trigger growth; only new keys do.
#[test]
fn overwrites_do_not_grow() {
    let mut m = BucketMap::new();
    for k in 0..8u32 {
        m.insert(k, 0);
    }
    let before: MapStats = m.stats();
    for round in 1..100 {
        for k in 0..8u32 {
            m.insert(k, round);
        }
    }
    let after = m.stats();
    assert_eq!(before.exponent, after.exponent);
    assert!(!after.growing);
    assert_eq!(m.get(&7), Some(&99));
}

// Test: the table never shrinks.
#[test]
fn removing_everything_keeps_the_exponent() {
    let mut m = BucketMap::new();
    for k in 0..1000u32 {
        m.insert(k, k);
    }
    let exponent = m.stats().exponent;
    for k in 0..1000u32 {
        m.remove(&k);
    }
    assert!(m.is_empty());
    assert_eq!(m.stats().exponent, exponent);
    m.insert(1, 1);
    assert_eq!(m.get(&1), Some(&1));
}

// Test: a cursor alive across a growth keeps the old array reachable and
// evacuation copies rather than moves.
#[test]
fn pinned_generation_is_retired_not_dropped() {
    let mut m = BucketMap::new();
    for k in 0..20u32 {
        m.insert(k, k);
    }
    let c = m.cursor();
    assert!(m.stats().iterating);
    let exponent = m.stats().exponent;
    let mut k = 100;
    while m.stats().exponent == exponent || m.stats().growing {
        m.insert(k, k);
        k += 1;
    }
    assert_eq!(m.stats().retired, 1);
    drop(c);
    m.insert(k, k);
    assert_eq!(m.stats().retired, 0);
}

thread_local! {
    static CLONES: Cell<usize> = const { Cell::new(0) };
}

// Counts deep copies made by evacuation.
#[derive(Debug, PartialEq, Eq)]
struct Counted(u32);

impl Clone for Counted {
    fn clone(&self) -> Self {
        CLONES.with(|c| c.set(c.get() + 1));
        Counted(self.0)
    }
}

fn grow_until<F: Fn(&MapStats) -> bool>(m: &mut BucketMap<u32, Counted>, next: &mut u32, done: F) {
    while !done(&m.stats()) {
        m.insert(*next, Counted(*next));
        *next += 1;
    }
}

// Test: a finished iteration during growth does not make the rest of the
// growth copy entries.
#[test]
fn growth_moves_entries_once_cursors_are_gone() {
    let mut m = BucketMap::with_capacity(400);
    let mut k = 0;
    grow_until(&mut m, &mut k, |s| s.growing);
    assert_eq!(m.iter().count(), m.len());
    assert!(!m.stats().iterating);

    CLONES.with(|c| c.set(0));
    grow_until(&mut m, &mut k, |s| !s.growing);
    assert_eq!(CLONES.with(Cell::get), 0);
    assert_eq!(m.stats().retired, 0);
    for i in 0..k {
        assert_eq!(m.get(&i), Some(&Counted(i)));
    }
}

// Test: a cursor held across the growth keeps its generation readable,
// so evacuation copies.
#[test]
fn growth_copies_entries_under_a_live_cursor() {
    let mut m = BucketMap::with_capacity(400);
    let mut k = 0;
    m.insert(k, Counted(k));
    k += 1;
    let c = m.cursor();
    assert!(m.stats().iterating);

    CLONES.with(|c| c.set(0));
    grow_until(&mut m, &mut k, |s| s.growing);
    grow_until(&mut m, &mut k, |s| !s.growing);
    assert!(CLONES.with(Cell::get) > 0);
    assert_eq!(m.stats().retired, 1);
    drop(c);
    assert!(!m.stats().iterating);
}

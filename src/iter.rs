//! Cursors and the borrowing iterators built on them.
//!
//! A `Cursor` is not tied to a borrow of the map: it is stepped with
//! `cursor.next(&map)`, and the map may be written between steps. The
//! cursor pins the generation it started on (and the one it is reading),
//! which keeps those bucket arrays alive across growths. Order is
//! randomized per cursor.

use crate::bucket::{BucketLoc, BUCKET_CNT};
use crate::fatal::Fatal;
use crate::flags::MapFlags;
use crate::keys::KeyCapability;
use crate::map::BucketMap;
use crate::table::RawTable;
use std::rc::Rc;

#[derive(Debug)]
struct Snapshot {
    id: u64,
    pin: Rc<()>,
    b: u8,
}

/// Where the cursor is inside a bucket chain.
#[derive(Debug)]
struct Position {
    generation: u64,
    loc: BucketLoc,
    /// Slots visited in this bucket, before the offset is applied.
    i: usize,
    /// Set when reading an old bucket on behalf of new bucket `check`:
    /// only entries that will land there are reported.
    check: Option<usize>,
    _pin: Rc<()>,
}

/// A resumable traversal of one map.
///
/// Every entry present for the whole traversal and never removed is
/// yielded exactly once. Entries inserted or removed while it runs may or
/// may not be seen.
#[derive(Debug)]
pub struct Cursor {
    snapshot: Option<Snapshot>,
    start_bucket: usize,
    offset: usize,
    bucket: usize,
    wrapped: bool,
    pos: Option<Position>,
}

impl Cursor {
    /// A cursor that yields nothing.
    pub fn empty() -> Self {
        Cursor {
            snapshot: None,
            start_bucket: 0,
            offset: 0,
            bucket: 0,
            wrapped: false,
            pos: None,
        }
    }

    pub(crate) fn new<K, V>(table: &RawTable<K, V>, flags: &MapFlags) -> Self {
        let current = match (&table.buckets, table.count) {
            (Some(current), n) if n > 0 => current,
            _ => return Cursor::empty(),
        };
        flags.note_cursor();
        let r: u64 = rand::random();
        let start_bucket = (r as usize) & current.mask();
        let offset = (r >> (64 - crate::bucket::BUCKET_CNT_BITS)) as usize & (BUCKET_CNT - 1);
        Cursor {
            snapshot: Some(Snapshot {
                id: current.id,
                pin: current.pin(),
                b: current.b,
            }),
            start_bucket,
            offset,
            bucket: start_bucket,
            wrapped: false,
            pos: None,
        }
    }

    /// Whether the traversal has ended (or never had anything to visit).
    pub fn is_done(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Advance and return the next entry, or `None` once the traversal
    /// has wrapped around to its starting bucket.
    ///
    /// Fatal if a write is in progress on `map`, or if `map` is not the
    /// map this cursor was created from.
    pub fn next<'m, K, V, C>(&mut self, map: &'m BucketMap<K, V, C>) -> Option<(&'m K, &'m V)>
    where
        C: KeyCapability<K>,
    {
        self.snapshot.as_ref()?;
        map.flags.assert_iterable();
        let item = self.step(&map.table, &map.keys);
        if item.is_none() {
            // Release the pins as soon as the traversal is over.
            self.snapshot = None;
            self.pos = None;
        }
        item
    }

    fn step<'m, K, V, C>(&mut self, table: &'m RawTable<K, V>, keys: &C) -> Option<(&'m K, &'m V)>
    where
        C: KeyCapability<K>,
    {
        let Cursor {
            snapshot,
            start_bucket,
            offset,
            bucket,
            wrapped,
            pos,
        } = self;
        let snap = snapshot.as_ref()?;
        let Some(started_on) = table
            .generation(snap.id)
            .filter(|g| g.is_pinned_by(&snap.pin))
        else {
            Fatal::ForeignCursor.raise()
        };

        loop {
            if pos.is_none() {
                if *bucket == *start_bucket && *wrapped {
                    return None;
                }
                // Started after the current growth began: the bucket may
                // still live in the old generation.
                let mid_growth = table.growing() && table.current_id() == Some(snap.id);
                let (array, index, check) = match &table.old_buckets {
                    Some(old) if mid_growth => {
                        let old_index = *bucket & old.mask();
                        if old.main(old_index).is_evacuated() {
                            (started_on, *bucket, None)
                        } else if old.len() == started_on.len() {
                            // Same-size growth: the old bucket maps onto this
                            // one and nothing else.
                            (old, old_index, None)
                        } else {
                            (old, old_index, Some(*bucket))
                        }
                    }
                    _ => (started_on, *bucket, None),
                };
                *pos = Some(Position {
                    generation: array.id,
                    loc: BucketLoc::Main(index),
                    i: 0,
                    check,
                    _pin: array.pin(),
                });
                *bucket += 1;
                if *bucket == 1usize << snap.b {
                    *bucket = 0;
                    *wrapped = true;
                }
            }

            let Some(p) = pos.as_mut() else {
                Fatal::BadMapState.raise()
            };
            let Some(array) = table.generation(p.generation) else {
                Fatal::BadMapState.raise()
            };
            let b = array.bucket(p.loc);
            while p.i < BUCKET_CNT {
                let slot = (p.i + *offset) & (BUCKET_CNT - 1);
                p.i += 1;
                let tag = b.tags[slot];
                if tag.is_vacant() {
                    continue;
                }
                let (k, v) = b.entry_at(slot);
                let reflexive = keys.is_reflexive() || keys.equals(k, k);
                if let Some(check) = p.check {
                    if reflexive {
                        let hash = keys.hash(k, table.seed);
                        if (hash as usize) & ((1usize << snap.b) - 1) != check {
                            continue;
                        }
                    } else if check >> (snap.b - 1) != usize::from(tag.low_bit()) {
                        // A NaN-like key cannot be rehashed repeatably; it
                        // goes wherever its tag's low bit sends it.
                        continue;
                    }
                }
                if !tag.is_moved() || !reflexive {
                    return Some((k, v));
                }
                // Moved since we started: ask the map for the live entry.
                // Absent means it was removed.
                if let Some(kv) = table.get_key_value(keys, k) {
                    return Some(kv);
                }
            }
            match b.overflow {
                Some(key) => {
                    p.loc = BucketLoc::Overflow(key);
                    p.i = 0;
                }
                None => *pos = None,
            }
        }
    }
}

/// Borrowing iterator over `(&K, &V)`.
pub struct Iter<'a, K, V, C> {
    map: &'a BucketMap<K, V, C>,
    cursor: Cursor,
    remaining: usize,
}

impl<'a, K, V, C> Iter<'a, K, V, C> {
    pub(crate) fn new(map: &'a BucketMap<K, V, C>) -> Self {
        Iter {
            map,
            cursor: Cursor::new(&map.table, &map.flags),
            remaining: map.table.count,
        }
    }
}

impl<'a, K, V, C: KeyCapability<K>> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.cursor.next(self.map)?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // The shared borrow rules out writes, so the count is exact.
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, C: KeyCapability<K>> ExactSizeIterator for Iter<'a, K, V, C> {}

impl<'a, K, V, C: KeyCapability<K>> core::iter::FusedIterator for Iter<'a, K, V, C> {}

pub struct Keys<'a, K, V, C> {
    pub(crate) inner: Iter<'a, K, V, C>,
}

impl<'a, K, V, C: KeyCapability<K>> Iterator for Keys<'a, K, V, C> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Values<'a, K, V, C> {
    pub(crate) inner: Iter<'a, K, V, C>,
}

impl<'a, K, V, C: KeyCapability<K>> Iterator for Values<'a, K, V, C> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use crate::BucketMap;
    use std::collections::HashSet;

    #[test]
    fn empty_map_cursor_sets_no_flags() {
        let m: BucketMap<u32, u32> = BucketMap::new();
        let mut c = m.cursor();
        assert!(c.is_done());
        assert!(c.next(&m).is_none());
        assert!(!m.stats().iterating);
    }

    #[test]
    fn visits_every_entry_once() {
        let m: BucketMap<u32, u32> = (0..500).map(|k| (k, k + 1)).collect();
        let mut seen = HashSet::new();
        let mut c = m.cursor();
        while let Some((k, v)) = c.next(&m) {
            assert_eq!(*v, *k + 1);
            assert!(seen.insert(*k), "key {k} yielded twice");
        }
        assert_eq!(seen.len(), 500);
        assert!(c.is_done());
        assert!(c.next(&m).is_none());
    }

    #[test]
    fn single_bucket_map_wraps_once() {
        let m: BucketMap<u8, ()> = (0..5).map(|k| (k, ())).collect();
        assert_eq!(m.stats().exponent, 0);
        assert_eq!(m.iter().count(), 5);
    }

    #[test]
    fn order_is_not_stable_across_cursors() {
        let m: BucketMap<u32, ()> = (0..64).map(|k| (k, ())).collect();
        let first: Vec<u32> = m.keys().copied().collect();
        let differs = (0..32).any(|_| m.keys().copied().collect::<Vec<_>>() != first);
        assert!(differs);
    }

    #[test]
    fn exact_size_hint() {
        let m: BucketMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
        let mut it = m.iter();
        assert_eq!(it.len(), 10);
        it.next();
        assert_eq!(it.len(), 9);
        assert_eq!(m.values().copied().sum::<u32>(), 45);
    }

    #[test]
    #[should_panic(expected = "cursor used with a different map")]
    fn cursor_from_another_map_is_fatal() {
        let a: BucketMap<u32, u32> = (0..3).map(|k| (k, k)).collect();
        let b: BucketMap<u32, u32> = (0..3).map(|k| (k, k)).collect();
        let mut c = a.cursor();
        c.next(&b);
    }
}

//! Growth: deciding when to grow, and evacuating old buckets a couple at
//! a time so no single write pays for the whole resize.
//!
//! A growth either doubles the bucket count (load factor exceeded) or
//! keeps it (too many overflow buckets, typically after many deletes).
//! Each old bucket is split between a lower and an upper destination by
//! one more hash bit; same-size growth sends everything to the bucket with
//! the same index. Old slots are marked with the half they went to so a
//! cursor still walking the old generation can follow them.

use crate::bucket::{BucketArray, BucketLoc, BUCKET_CNT};
use crate::fatal::Fatal;
use crate::flags::{MapFlags, ITERATOR, OLD_ITERATOR, SAME_SIZE_GROW};
use crate::keys::KeyCapability;
use crate::slot::Slot;
use crate::table::RawTable;
use crate::tag::{top_hash, Tag};
use rand::Rng;

/// Maximum average entries per bucket, as a fraction: 6.5.
pub(crate) const LOAD_FACTOR_NUM: u128 = 13;
pub(crate) const LOAD_FACTOR_DEN: u128 = 2;

/// Whether `count` entries in `2^b` buckets exceed the load factor.
#[inline]
pub(crate) fn over_load_factor(count: usize, b: u8) -> bool {
    count >= BUCKET_CNT && (count as u128) * LOAD_FACTOR_DEN >= LOAD_FACTOR_NUM << b
}

/// Smallest exponent whose array holds `hint` entries under the load factor.
pub(crate) fn exponent_for(hint: usize) -> u8 {
    let mut b = 0;
    while over_load_factor(hint, b) {
        b += 1;
    }
    b
}

/// Number of overflow buckets in the current generation.
///
/// Exact while the table has fewer than 2^16 buckets; above that it is
/// bumped with probability 1/2^(b-15) so it stays a u16 and still reaches
/// about 2^15 when there are as many overflow buckets as buckets.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct OverflowCounter(u16);

impl OverflowCounter {
    pub(crate) fn increment(&mut self, b: u8) {
        if b < 16 {
            self.0 = self.0.saturating_add(1);
            return;
        }
        let shift = u32::from(b - 15).min(63);
        let mask = (1u64 << shift) - 1;
        if rand::thread_rng().gen::<u64>() & mask == 0 {
            self.0 = self.0.saturating_add(1);
        }
    }

    /// Roughly as many overflow buckets as buckets.
    pub(crate) fn too_many(self, b: u8) -> bool {
        if b < 16 {
            self.0 >= 1u16 << b
        } else {
            self.0 >= 1 << 15
        }
    }

    pub(crate) fn get(self) -> u16 {
        self.0
    }
}

/// Append position in one destination chain of the new generation.
struct Destination {
    loc: BucketLoc,
    i: usize,
}

impl Destination {
    fn new(index: usize) -> Self {
        Self {
            loc: BucketLoc::Main(index),
            i: 0,
        }
    }

    fn push<K, V>(
        &mut self,
        array: &mut BucketArray<K, V>,
        noverflow: &mut OverflowCounter,
        top: u8,
        key: Slot<K>,
        value: Slot<V>,
    ) {
        if self.i == BUCKET_CNT {
            self.loc = array.push_overflow(self.loc);
            noverflow.increment(array.b);
            self.i = 0;
        }
        array.bucket_mut(self.loc).put(self.i, top, key, value);
        self.i += 1;
    }
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn old_bucket_mask(&self) -> usize {
        match &self.old_buckets {
            Some(old) => old.mask(),
            None => Fatal::BadMapState.raise(),
        }
    }

    /// Start a growth. Evacuation happens later, from `grow_work`.
    pub(crate) fn hash_grow(&mut self, flags: &MapFlags) {
        if self.old_buckets.is_some() {
            Fatal::BadMapState.raise();
        }
        let Some(outgoing) = self.buckets.take() else {
            Fatal::BadMapState.raise()
        };
        let bigger = over_load_factor(self.count, self.b);
        if !bigger {
            flags.insert(SAME_SIZE_GROW);
        }
        flags.rotate_cursor_flags(outgoing.is_pinned());

        let old_b = self.b;
        if bigger {
            self.b += 1;
        }
        log::debug!(
            "map growth started: {} entries, overflow counter {}, exponent {} -> {}{}",
            self.count,
            self.noverflow.get(),
            old_b,
            self.b,
            if bigger { "" } else { " (same size)" }
        );
        self.old_buckets = Some(outgoing);
        self.buckets = Some(self.new_array(self.b));
        self.nevacuate = 0;
        self.noverflow = OverflowCounter::default();
    }
}

impl<K: Clone, V: Clone> RawTable<K, V> {
    /// Evacuate the old bucket behind `bucket`, then one more at the
    /// evacuation cursor.
    pub(crate) fn grow_work<C>(&mut self, keys: &C, flags: &MapFlags, bucket: usize)
    where
        C: KeyCapability<K>,
    {
        let mask = self.old_bucket_mask();
        self.evacuate(keys, flags, bucket & mask);
        if self.growing() {
            self.evacuate(keys, flags, self.nevacuate);
        }
    }

    pub(crate) fn evacuate<C>(&mut self, keys: &C, flags: &MapFlags, oldbucket: usize)
    where
        C: KeyCapability<K>,
    {
        let (Some(old), Some(new)) = (self.old_buckets.as_mut(), self.buckets.as_mut()) else {
            Fatal::BadMapState.raise()
        };
        let newbit = old.len();

        if !old.main(oldbucket).is_evacuated() {
            let same_size = flags.contains(SAME_SIZE_GROW);
            // A live cursor on the old generation still reads these slots.
            let retain = flags.contains(OLD_ITERATOR) && old.is_pinned();
            let cursors_on_new = flags.contains(ITERATOR);

            let mut low = Destination::new(oldbucket);
            let mut high = Destination::new(oldbucket + newbit);
            let mut next = Some(BucketLoc::Main(oldbucket));
            while let Some(loc) = next {
                let src = old.bucket_mut(loc);
                for i in 0..BUCKET_CNT {
                    let mut top = match src.tags[i] {
                        Tag::Empty => {
                            src.tags[i] = Tag::EvacuatedEmpty;
                            continue;
                        }
                        Tag::Filled(top) => top,
                        _ => Fatal::BadMapState.raise(),
                    };

                    let mut to_low = true;
                    if !same_size {
                        let key = src.key_at(i);
                        let mut hash = keys.hash(key, self.seed);
                        if cursors_on_new && !keys.is_reflexive() && !keys.equals(key, key) {
                            // The hash of a key != key is not repeatable, but a
                            // cursor may already have routed it by its tag.
                            // Follow the tag's low bit and draw a fresh top
                            // hash for the next level.
                            if top & 1 != 0 {
                                hash |= newbit as u64;
                            } else {
                                hash &= !(newbit as u64);
                            }
                            top = top_hash(hash);
                        }
                        to_low = hash & newbit as u64 == 0;
                    }

                    src.tags[i] = if to_low {
                        Tag::EvacuatedLow
                    } else {
                        Tag::EvacuatedHigh
                    };
                    let (key, value) = if retain { src.copy(i) } else { src.take(i) };
                    let dst = if to_low { &mut low } else { &mut high };
                    dst.push(new, &mut self.noverflow, top, key, value);
                }
                next = src.overflow.map(BucketLoc::Overflow);
            }

            if !retain {
                old.free_overflow(oldbucket);
            }
        }

        if oldbucket == self.nevacuate {
            self.nevacuate += 1;
            if self.nevacuate == newbit {
                self.finish_growth(flags);
            }
        }
    }

    fn finish_growth(&mut self, flags: &MapFlags) {
        if let Some(old) = self.old_buckets.take() {
            log::debug!(
                "map growth finished: {} entries in {} buckets",
                self.count,
                1usize << self.b
            );
            if old.is_pinned() {
                self.retired.push(old);
            }
        }
        flags.remove(SAME_SIZE_GROW);
    }
}

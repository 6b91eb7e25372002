//! Buckets and bucket arrays.
//!
//! A bucket keeps its eight tags together, then the eight keys, then the
//! eight values, plus a link to an overflow bucket. One `BucketArray` is a
//! generation: `2^b` main buckets and an arena that owns every overflow
//! bucket chained off them. Overflow buckets are addressed by generational
//! slotmap keys, so a stale link can never alias a reused bucket.

use crate::fatal::Fatal;
use crate::slot::Slot;
use crate::tag::Tag;
use slotmap::{new_key_type, SlotMap};
use std::rc::Rc;

pub(crate) const BUCKET_CNT_BITS: u32 = 3;
/// Slots per bucket.
pub const BUCKET_CNT: usize = 1 << BUCKET_CNT_BITS;

new_key_type! {
    pub(crate) struct OverflowKey;
}

/// Address of one bucket inside a generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum BucketLoc {
    Main(usize),
    Overflow(OverflowKey),
}

#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    pub(crate) tags: [Tag; BUCKET_CNT],
    keys: [Option<Slot<K>>; BUCKET_CNT],
    values: [Option<Slot<V>>; BUCKET_CNT],
    pub(crate) overflow: Option<OverflowKey>,
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            tags: [Tag::Empty; BUCKET_CNT],
            keys: Default::default(),
            values: Default::default(),
            overflow: None,
        }
    }

    /// The first tag carries the evacuation state of the whole chain.
    #[inline]
    pub(crate) fn is_evacuated(&self) -> bool {
        self.tags[0].is_evacuated()
    }

    #[inline]
    pub(crate) fn key(&self, i: usize) -> Option<&K> {
        self.keys[i].as_ref().map(Slot::get)
    }

    #[inline]
    pub(crate) fn value(&self, i: usize) -> Option<&V> {
        self.values[i].as_ref().map(Slot::get)
    }

    /// Key of a slot whose tag says it holds one.
    #[inline]
    pub(crate) fn key_at(&self, i: usize) -> &K {
        match self.key(i) {
            Some(k) => k,
            None => Fatal::BadMapState.raise(),
        }
    }

    #[inline]
    pub(crate) fn entry_at(&self, i: usize) -> (&K, &V) {
        match (self.key(i), self.value(i)) {
            (Some(k), Some(v)) => (k, v),
            _ => Fatal::BadMapState.raise(),
        }
    }

    pub(crate) fn put(&mut self, i: usize, top: u8, key: Slot<K>, value: Slot<V>) {
        self.tags[i] = Tag::Filled(top);
        self.keys[i] = Some(key);
        self.values[i] = Some(value);
    }

    /// Empty slot `i`, handing back its storage.
    pub(crate) fn take(&mut self, i: usize) -> (Slot<K>, Slot<V>) {
        match (self.keys[i].take(), self.values[i].take()) {
            (Some(k), Some(v)) => (k, v),
            _ => Fatal::BadMapState.raise(),
        }
    }
}

impl<K: Clone, V: Clone> Bucket<K, V> {
    pub(crate) fn copy(&self, i: usize) -> (Slot<K>, Slot<V>) {
        match (&self.keys[i], &self.values[i]) {
            (Some(k), Some(v)) => (k.clone(), v.clone()),
            _ => Fatal::BadMapState.raise(),
        }
    }

    pub(crate) fn value_mut(&mut self, i: usize) -> &mut V {
        match self.values[i].as_mut() {
            Some(v) => v.get_mut(),
            None => Fatal::BadMapState.raise(),
        }
    }

    pub(crate) fn replace_key(&mut self, i: usize, key: K) {
        self.keys[i] = Some(Slot::new(key));
    }

    pub(crate) fn replace_value(&mut self, i: usize, value: V) -> V {
        match self.values[i].replace(Slot::new(value)) {
            Some(old) => old.into_inner(),
            None => Fatal::BadMapState.raise(),
        }
    }
}

/// One generation of buckets.
#[derive(Debug)]
pub(crate) struct BucketArray<K, V> {
    pub(crate) id: u64,
    pub(crate) b: u8,
    buckets: Box<[Bucket<K, V>]>,
    overflow: SlotMap<OverflowKey, Bucket<K, V>>,
    pin: Rc<()>,
}

impl<K, V> BucketArray<K, V> {
    pub(crate) fn new(id: u64, b: u8) -> Self {
        let buckets = (0..1usize << b).map(|_| Bucket::new()).collect();
        Self {
            id,
            b,
            buckets,
            overflow: SlotMap::with_key(),
            pin: Rc::new(()),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask()
    }

    pub(crate) fn overflow_count(&self) -> usize {
        self.overflow.len()
    }

    /// A handle that keeps this generation alive for a cursor.
    pub(crate) fn pin(&self) -> Rc<()> {
        Rc::clone(&self.pin)
    }

    pub(crate) fn is_pinned(&self) -> bool {
        Rc::strong_count(&self.pin) > 1
    }

    pub(crate) fn is_pinned_by(&self, pin: &Rc<()>) -> bool {
        Rc::ptr_eq(&self.pin, pin)
    }

    #[inline]
    pub(crate) fn main(&self, index: usize) -> &Bucket<K, V> {
        &self.buckets[index]
    }

    #[inline]
    pub(crate) fn bucket(&self, loc: BucketLoc) -> &Bucket<K, V> {
        match loc {
            BucketLoc::Main(i) => &self.buckets[i],
            BucketLoc::Overflow(key) => match self.overflow.get(key) {
                Some(b) => b,
                None => Fatal::BadMapState.raise(),
            },
        }
    }

    #[inline]
    pub(crate) fn bucket_mut(&mut self, loc: BucketLoc) -> &mut Bucket<K, V> {
        match loc {
            BucketLoc::Main(i) => &mut self.buckets[i],
            BucketLoc::Overflow(key) => match self.overflow.get_mut(key) {
                Some(b) => b,
                None => Fatal::BadMapState.raise(),
            },
        }
    }

    /// Chain a fresh overflow bucket after `last`, which must end its chain.
    pub(crate) fn push_overflow(&mut self, last: BucketLoc) -> BucketLoc {
        let key = self.overflow.insert(Bucket::new());
        let tail = self.bucket_mut(last);
        debug_assert!(tail.overflow.is_none());
        tail.overflow = Some(key);
        log::trace!("generation {}: chained overflow bucket", self.id);
        BucketLoc::Overflow(key)
    }

    /// Unlink and free the overflow chain of main bucket `index`.
    pub(crate) fn free_overflow(&mut self, index: usize) {
        let mut next = self.buckets[index].overflow.take();
        while let Some(key) = next {
            next = self.overflow.remove(key).and_then(|b| b.overflow);
        }
    }

    /// Walk the chain starting at main bucket `index`.
    pub(crate) fn chain(&self, index: usize) -> Chain<'_, K, V> {
        Chain {
            array: self,
            next: Some(BucketLoc::Main(index)),
        }
    }
}

pub(crate) struct Chain<'a, K, V> {
    array: &'a BucketArray<K, V>,
    next: Option<BucketLoc>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = (BucketLoc, &'a Bucket<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let loc = self.next?;
        let bucket = self.array.bucket(loc);
        self.next = bucket.overflow.map(BucketLoc::Overflow);
        Some((loc, bucket))
    }
}

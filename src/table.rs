//! RawTable: bucket bookkeeping plus lookup, insert and delete.
//!
//! The table owns the current generation, the old generation while a
//! growth is in progress, and any finished generations a cursor still
//! pins. It never consults the write flag itself; the public map wraps
//! each mutating call in a `WriteGuard` and passes the flags down so
//! growth can read and update the cursor bits.

use crate::bucket::{BucketArray, BucketLoc, BUCKET_CNT};
use crate::fatal::Fatal;
use crate::flags::MapFlags;
use crate::growth::{over_load_factor, OverflowCounter};
use crate::keys::KeyCapability;
use crate::slot::Slot;
use crate::tag::{top_hash, Tag};

#[derive(Debug)]
pub(crate) struct RawTable<K, V> {
    /// Live entries.
    pub(crate) count: usize,
    /// log2 of the bucket count.
    pub(crate) b: u8,
    pub(crate) seed: u64,
    /// Allocated on first insert.
    pub(crate) buckets: Option<BucketArray<K, V>>,
    /// Present only while growing.
    pub(crate) old_buckets: Option<BucketArray<K, V>>,
    /// Old buckets below this index have been evacuated.
    pub(crate) nevacuate: usize,
    pub(crate) noverflow: OverflowCounter,
    /// Finished generations still pinned by cursors.
    pub(crate) retired: Vec<BucketArray<K, V>>,
    next_id: u64,
}

/// Position of an entry found by `locate`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Found {
    in_old: bool,
    loc: BucketLoc,
    slot: usize,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(b: u8, seed: u64) -> Self {
        Self {
            count: 0,
            b,
            seed,
            buckets: None,
            old_buckets: None,
            nevacuate: 0,
            noverflow: OverflowCounter::default(),
            retired: Vec::new(),
            next_id: 0,
        }
    }

    #[inline]
    pub(crate) fn growing(&self) -> bool {
        self.old_buckets.is_some()
    }

    pub(crate) fn new_array(&mut self, b: u8) -> BucketArray<K, V> {
        let id = self.next_id;
        self.next_id += 1;
        BucketArray::new(id, b)
    }

    pub(crate) fn current_id(&self) -> Option<u64> {
        self.buckets.as_ref().map(|a| a.id)
    }

    /// Any generation a cursor may still reference.
    pub(crate) fn generation(&self, id: u64) -> Option<&BucketArray<K, V>> {
        self.buckets
            .iter()
            .chain(self.old_buckets.iter())
            .chain(self.retired.iter())
            .find(|g| g.id == id)
    }

    pub(crate) fn prune_retired(&mut self) {
        if !self.retired.is_empty() {
            self.retired.retain(BucketArray::is_pinned);
        }
    }

    /// Find `key`, reading the old generation when its bucket has not
    /// been evacuated yet.
    pub(crate) fn locate<C>(&self, keys: &C, key: &K) -> Option<Found>
    where
        C: KeyCapability<K>,
    {
        if self.count == 0 {
            return None;
        }
        let current = self.buckets.as_ref()?;
        let hash = keys.hash(key, self.seed);
        let mut array = current;
        let mut index = current.index_of(hash);
        let mut in_old = false;
        if let Some(old) = &self.old_buckets {
            let old_index = old.index_of(hash);
            if !old.main(old_index).is_evacuated() {
                array = old;
                index = old_index;
                in_old = true;
            }
        }
        let top = top_hash(hash);
        for (loc, bucket) in array.chain(index) {
            for i in 0..BUCKET_CNT {
                if bucket.tags[i] == Tag::Filled(top) && keys.equals(key, bucket.key_at(i)) {
                    return Some(Found {
                        in_old,
                        loc,
                        slot: i,
                    });
                }
            }
        }
        None
    }

    pub(crate) fn get_key_value<C>(&self, keys: &C, key: &K) -> Option<(&K, &V)>
    where
        C: KeyCapability<K>,
    {
        let found = self.locate(keys, key)?;
        let array = if found.in_old {
            self.old_buckets.as_ref()
        } else {
            self.buckets.as_ref()
        }?;
        Some(array.bucket(found.loc).entry_at(found.slot))
    }
}

impl<K: Clone, V: Clone> RawTable<K, V> {
    pub(crate) fn value_mut<C>(&mut self, keys: &C, key: &K) -> Option<&mut V>
    where
        C: KeyCapability<K>,
    {
        let found = self.locate(keys, key)?;
        let array = if found.in_old {
            self.old_buckets.as_mut()
        } else {
            self.buckets.as_mut()
        }?;
        Some(array.bucket_mut(found.loc).value_mut(found.slot))
    }

    /// Upsert. Returns the value that was replaced.
    ///
    /// `hash` is computed by the caller before it takes the write flag, so
    /// a panicking hash function leaves the map usable.
    pub(crate) fn insert<C>(
        &mut self,
        keys: &C,
        flags: &MapFlags,
        hash: u64,
        key: K,
        value: V,
    ) -> Option<V>
    where
        C: KeyCapability<K>,
    {
        self.prune_retired();
        if self.buckets.is_none() {
            self.buckets = Some(self.new_array(self.b));
        }
        let top = top_hash(hash);

        loop {
            let index = match &self.buckets {
                Some(current) => current.index_of(hash),
                None => Fatal::BadMapState.raise(),
            };
            if self.growing() {
                self.grow_work(keys, flags, index);
            }
            let Some(current) = self.buckets.as_mut() else {
                Fatal::BadMapState.raise()
            };

            let mut found = None;
            let mut vacant = None;
            let mut tail = BucketLoc::Main(index);
            'scan: for (loc, bucket) in current.chain(index) {
                tail = loc;
                for i in 0..BUCKET_CNT {
                    match bucket.tags[i] {
                        Tag::Filled(t) if t == top && keys.equals(&key, bucket.key_at(i)) => {
                            found = Some((loc, i));
                            break 'scan;
                        }
                        Tag::Empty if vacant.is_none() => vacant = Some((loc, i)),
                        _ => {}
                    }
                }
            }

            if let Some((loc, i)) = found {
                let bucket = current.bucket_mut(loc);
                if keys.needs_key_update() {
                    bucket.replace_key(i, key);
                }
                return Some(bucket.replace_value(i, value));
            }

            // New entry. Start growing first if we are over the load
            // factor or the chains are too sparse, then retry.
            if self.old_buckets.is_none()
                && (over_load_factor(self.count, self.b) || self.noverflow.too_many(self.b))
            {
                self.hash_grow(flags);
                continue;
            }

            let (loc, i) = match vacant {
                Some(pos) => pos,
                None => {
                    let loc = current.push_overflow(tail);
                    self.noverflow.increment(current.b);
                    (loc, 0)
                }
            };
            current
                .bucket_mut(loc)
                .put(i, top, Slot::new(key), Slot::new(value));
            self.count += 1;
            return None;
        }
    }

    pub(crate) fn remove<C>(&mut self, keys: &C, flags: &MapFlags, hash: u64, key: &K) -> Option<V>
    where
        C: KeyCapability<K>,
    {
        self.prune_retired();
        let index = self.buckets.as_ref()?.index_of(hash);
        if self.growing() {
            self.grow_work(keys, flags, index);
        }
        let current = self.buckets.as_mut()?;
        let top = top_hash(hash);

        let mut hit = None;
        'scan: for (loc, bucket) in current.chain(index) {
            for i in 0..BUCKET_CNT {
                if bucket.tags[i] == Tag::Filled(top) && keys.equals(key, bucket.key_at(i)) {
                    hit = Some((loc, i));
                    break 'scan;
                }
            }
        }
        let (loc, i) = hit?;

        let bucket = current.bucket_mut(loc);
        let (_key, value) = bucket.take(i);
        bucket.tags[i] = Tag::Empty;
        self.count = match self.count.checked_sub(1) {
            Some(n) => n,
            None => Fatal::BadMapState.raise(),
        };
        Some(value.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keys::StdKeys;

    fn table() -> (RawTable<u64, u64>, StdKeys, MapFlags) {
        (RawTable::new(0, 42), StdKeys::default(), MapFlags::new())
    }

    pub(crate) fn put(
        t: &mut RawTable<u64, u64>,
        keys: &StdKeys,
        flags: &MapFlags,
        k: u64,
        v: u64,
    ) -> Option<u64> {
        let hash = keys.hash(&k, t.seed);
        t.insert(keys, flags, hash, k, v)
    }

    fn del(t: &mut RawTable<u64, u64>, keys: &StdKeys, flags: &MapFlags, k: u64) -> Option<u64> {
        let hash = keys.hash(&k, t.seed);
        t.remove(keys, flags, hash, &k)
    }

    #[test]
    fn first_insert_allocates_lazily() {
        let (mut t, keys, flags) = table();
        assert!(t.buckets.is_none());
        assert!(t.get_key_value(&keys, &1).is_none());
        assert_eq!(put(&mut t, &keys, &flags, 1, 10), None);
        assert!(t.buckets.is_some());
        assert_eq!(t.get_key_value(&keys, &1), Some((&1, &10)));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let (mut t, keys, flags) = table();
        put(&mut t, &keys, &flags, 7, 1);
        assert_eq!(put(&mut t, &keys, &flags, 7, 2), Some(1));
        assert_eq!(t.count, 1);
        *t.value_mut(&keys, &7).unwrap() += 40;
        assert_eq!(t.get_key_value(&keys, &7), Some((&7, &42)));
    }

    #[test]
    fn remove_frees_slot_for_reuse() {
        let (mut t, keys, flags) = table();
        put(&mut t, &keys, &flags, 3, 30);
        assert_eq!(del(&mut t, &keys, &flags, 3), Some(30));
        assert_eq!(del(&mut t, &keys, &flags, 3), None);
        assert_eq!(t.count, 0);
        put(&mut t, &keys, &flags, 4, 40);
        let a = t.buckets.as_ref().unwrap();
        assert_eq!(a.overflow_count(), 0);
    }

    #[test]
    fn full_bucket_chains_an_overflow_bucket() {
        // Exponent 0: a single bucket, so the ninth key must overflow
        // unless growth kicks in first (it does not below 8 entries).
        let (mut t, keys, flags) = table();
        for k in 0..8 {
            put(&mut t, &keys, &flags, k, k);
        }
        assert_eq!(t.buckets.as_ref().unwrap().overflow_count(), 0);
        assert_eq!(t.b, 0);
        // count == 8 >= 6.5 triggers a doubling on the next new key.
        put(&mut t, &keys, &flags, 8, 8);
        assert_eq!(t.b, 1);
        for k in 0..9 {
            assert_eq!(t.get_key_value(&keys, &k), Some((&k, &k)));
        }
    }
}

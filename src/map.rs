use crate::bucket::{Bucket, BucketArray};
use crate::fatal::Fatal;
use crate::flags::{MapFlags, SAME_SIZE_GROW};
use crate::growth::exponent_for;
use crate::iter::{Cursor, Iter, Keys, Values};
use crate::keys::{KeyCapability, StdKeys};
use crate::table::RawTable;
use core::fmt;
use core::hash::Hash;
use core::mem;

/// Largest accepted size hint.
pub const MAX_SIZE_HINT: usize = i32::MAX as usize;

/// An incrementally growing hash map with 8-slot buckets and overflow
/// chains.
///
/// Hashing and equality come from the key capability `C`. Growth never
/// rehashes the whole table at once: each insert or remove moves at most
/// two old buckets into the new array.
pub struct BucketMap<K, V, C = StdKeys> {
    pub(crate) keys: C,
    pub(crate) flags: MapFlags,
    pub(crate) table: RawTable<K, V>,
}

/// Point-in-time bookkeeping of a map.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MapStats {
    pub len: usize,
    /// log2 of the bucket count.
    pub exponent: u8,
    /// Main buckets allocated in the current array; 0 before the first insert.
    pub buckets: usize,
    /// Overflow buckets across the current and old arrays.
    pub overflow_buckets: usize,
    pub growing: bool,
    pub same_size_grow: bool,
    /// Old buckets below this index have been moved.
    pub evacuated: usize,
    /// Finished generations kept alive by cursors.
    pub retired: usize,
    /// A live cursor holds the current or old array.
    pub iterating: bool,
}

impl<K, V> BucketMap<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_keys(StdKeys::new())
    }

    /// A map sized so that `hint` entries fit without growing.
    pub fn with_capacity(hint: usize) -> Self {
        Self::with_capacity_and_keys(hint, StdKeys::new())
    }
}

impl<K, V, C> BucketMap<K, V, C>
where
    C: KeyCapability<K>,
{
    pub fn with_keys(keys: C) -> Self {
        Self::with_capacity_and_keys(0, keys)
    }

    pub fn with_capacity_and_keys(hint: usize, keys: C) -> Self {
        Self::build(hint, rand::random(), keys)
    }

    /// Fixed hash seed, for reproducible layouts.
    pub fn with_seed(seed: u64, keys: C) -> Self {
        Self::build(0, seed, keys)
    }

    fn build(hint: usize, seed: u64, keys: C) -> Self {
        if !keys.is_hashable() {
            Fatal::UnsupportedKey.raise();
        }
        if hint > MAX_SIZE_HINT {
            Fatal::SizeOutOfRange.raise();
        }
        let mut b = exponent_for(hint);
        // More buckets than the address space holds: start small and grow.
        let fits = 1usize
            .checked_shl(u32::from(b))
            .and_then(|n| n.checked_mul(mem::size_of::<Bucket<K, V>>()))
            .map_or(false, |bytes| bytes <= isize::MAX as usize);
        if !fits {
            b = 0;
        }
        BucketMap {
            keys,
            flags: MapFlags::new(),
            table: RawTable::new(b, seed),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.count == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.lookup(key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Lookup that skips the write-in-progress check, as used by cursors
    /// re-reading an entry that moved.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.table.get_key_value(&self.keys, key)
    }

    fn lookup(&self, key: &K) -> Option<(&K, &V)> {
        if self.table.count == 0 {
            return None;
        }
        self.flags.assert_readable();
        self.table.get_key_value(&self.keys, key)
    }

    /// Start a detached traversal. Step it with `Cursor::next(&map)`; the
    /// map may be modified between steps.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.table, &self.flags)
    }

    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter::new(self)
    }

    pub fn keys(&self) -> Keys<'_, K, V, C> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V, C> {
        Values { inner: self.iter() }
    }

    pub fn stats(&self) -> MapStats {
        let t = &self.table;
        let overflow_buckets = t
            .buckets
            .iter()
            .chain(t.old_buckets.iter())
            .map(|a| a.overflow_count())
            .sum();
        MapStats {
            len: t.count,
            exponent: t.b,
            buckets: t.buckets.as_ref().map_or(0, |a| a.len()),
            overflow_buckets,
            growing: t.growing(),
            same_size_grow: self.flags.contains(SAME_SIZE_GROW),
            evacuated: t.nevacuate,
            retired: t.retired.len(),
            iterating: t
                .buckets
                .iter()
                .chain(t.old_buckets.iter())
                .any(BucketArray::is_pinned),
        }
    }

    /// The capability this map hashes and compares keys with.
    pub fn capability(&self) -> &C {
        &self.keys
    }
}

impl<K, V, C> BucketMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyCapability<K>,
{
    /// Mutable access to a value. Does no growth work.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.table.count == 0 {
            return None;
        }
        let _w = self.flags.begin_write();
        self.table.value_mut(&self.keys, key)
    }

    /// Insert or overwrite. Returns the previous value for an equal key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.flags.is_writing() {
            Fatal::ConcurrentWrite.raise();
        }
        // Hash before taking the write flag: the hash function may panic.
        let hash = self.keys.hash(&key, self.table.seed);
        let _w = self.flags.begin_write();
        self.table.insert(&self.keys, &self.flags, hash, key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.table.count == 0 {
            return None;
        }
        if self.flags.is_writing() {
            Fatal::ConcurrentWrite.raise();
        }
        let hash = self.keys.hash(key, self.table.seed);
        let _w = self.flags.begin_write();
        self.table.remove(&self.keys, &self.flags, hash, key)
    }
}

impl<K, V> Default for BucketMap<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> fmt::Debug for BucketMap<K, V, C>
where
    K: fmt::Debug,
    V: fmt::Debug,
    C: KeyCapability<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C> Extend<(K, V)> for BucketMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyCapability<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C> FromIterator<(K, V)> for BucketMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyCapability<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity_and_keys(iter.size_hint().0, C::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, C> IntoIterator for &'a BucketMap<K, V, C>
where
    C: KeyCapability<K>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//! Entry points over optional map handles.
//!
//! These mirror how a language runtime drives its built-in map: a map
//! variable may hold no map at all. Reads through an absent handle behave
//! as an empty map; writes through one are fatal.

use crate::fatal::Fatal;
use crate::iter::Cursor;
use crate::keys::KeyCapability;
use crate::map::BucketMap;

/// Create a map. The value layout is that of `V` (see `SlotLayout::of`).
pub fn create<K, V, C>(keys: C, size_hint: usize) -> BucketMap<K, V, C>
where
    C: KeyCapability<K>,
{
    BucketMap::with_capacity_and_keys(size_hint, keys)
}

pub fn get<'m, K, V, C>(map: Option<&'m BucketMap<K, V, C>>, key: &K) -> Option<&'m V>
where
    C: KeyCapability<K>,
{
    map?.get(key)
}

/// Lookup used by cursors; never checks for a write in progress.
pub fn get_for_iteration<'m, K, V, C>(
    map: Option<&'m BucketMap<K, V, C>>,
    key: &K,
) -> Option<(&'m K, &'m V)>
where
    C: KeyCapability<K>,
{
    map?.get_key_value(key)
}

/// Upsert. Fatal on an absent map.
pub fn set<K, V, C>(map: Option<&mut BucketMap<K, V, C>>, key: K, value: V)
where
    K: Clone,
    V: Clone,
    C: KeyCapability<K>,
{
    match map {
        Some(m) => {
            m.insert(key, value);
        }
        None => Fatal::NilMapWrite.raise(),
    }
}

/// Remove if present. Fatal on an absent map.
pub fn delete<K, V, C>(map: Option<&mut BucketMap<K, V, C>>, key: &K)
where
    K: Clone,
    V: Clone,
    C: KeyCapability<K>,
{
    match map {
        Some(m) => {
            m.remove(key);
        }
        None => Fatal::NilMapDelete.raise(),
    }
}

pub fn len<K, V, C>(map: Option<&BucketMap<K, V, C>>) -> usize
where
    C: KeyCapability<K>,
{
    map.map_or(0, BucketMap::len)
}

pub fn new_iterator<K, V, C>(map: Option<&BucketMap<K, V, C>>) -> Cursor
where
    C: KeyCapability<K>,
{
    map.map_or_else(Cursor::empty, BucketMap::cursor)
}

/// Next entry, or `None` when done.
pub fn next<'m, K, V, C>(
    it: &mut Cursor,
    map: Option<&'m BucketMap<K, V, C>>,
) -> Option<(&'m K, &'m V)>
where
    C: KeyCapability<K>,
{
    match map {
        Some(m) => it.next(m),
        None if it.is_done() => None,
        None => Fatal::ForeignCursor.raise(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StdKeys;

    type Map = BucketMap<u32, u32>;

    #[test]
    fn absent_map_reads_as_empty() {
        let none: Option<&Map> = None;
        assert_eq!(get(none, &1), None);
        assert_eq!(get_for_iteration(none, &1), None);
        assert_eq!(len(none), 0);
        let mut it = new_iterator(none);
        assert!(next(&mut it, none).is_none());
    }

    #[test]
    #[should_panic(expected = "assignment to entry in nil map")]
    fn set_on_absent_map_is_fatal() {
        set::<u32, u32, StdKeys>(None, 1, 1);
    }

    #[test]
    #[should_panic(expected = "delete from nil map")]
    fn delete_on_absent_map_is_fatal() {
        delete::<u32, u32, StdKeys>(None, &1);
    }

    #[test]
    fn round_trip_through_handles() {
        let mut m: Map = create(StdKeys::default(), 0);
        set(Some(&mut m), 1, 10);
        set(Some(&mut m), 1, 11);
        set(Some(&mut m), 2, 20);
        delete(Some(&mut m), &3);
        assert_eq!(len(Some(&m)), 2);
        assert_eq!(get(Some(&m), &1), Some(&11));
        assert_eq!(get_for_iteration(Some(&m), &2), Some((&2, &20)));

        let mut it = new_iterator(Some(&m));
        let mut total = 0;
        while let Some((_, v)) = next(&mut it, Some(&m)) {
            total += *v;
        }
        assert_eq!(total, 31);
    }
}

use bucket_map::{BucketMap, FloatKeys};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

// Out-of-line value: wider than the inline limit.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Wide([u64; 20]);

impl Wide {
    fn new(x: u64) -> Self {
        Wide([x; 20])
    }
}

// Model operations on BucketMap with string keys and wide values and compare
// with std::collections::HashMap after every step.
proptest! {
    #[test]
    fn prop_matches_std_hashmap(ops in proptest::collection::vec((0u8..3u8, "[a-d]{0,3}", any::<u64>()), 1..300)) {
        let mut m: BucketMap<String, Wide> = BucketMap::new();
        let mut model: HashMap<String, Wide> = HashMap::new();
        for (op, k, x) in ops {
            match op {
                0 => {
                    prop_assert_eq!(m.insert(k.clone(), Wide::new(x)), model.insert(k, Wide::new(x)));
                }
                1 => {
                    prop_assert_eq!(m.remove(&k), model.remove(&k));
                }
                2 => {
                    prop_assert_eq!(m.get(&k), model.get(&k));
                }
                _ => unreachable!(),
            }
            prop_assert_eq!(m.len(), model.len());
        }
        let mut seen = HashSet::new();
        for (k, v) in &m {
            prop_assert_eq!(model.get(k), Some(v));
            prop_assert!(seen.insert(k.clone()));
        }
        prop_assert_eq!(seen.len(), model.len());
    }

    #[test]
    fn prop_growth_preserves_entries(keys in proptest::collection::hash_set(any::<u64>(), 0..2000)) {
        let mut m = BucketMap::new();
        for (i, k) in keys.iter().enumerate() {
            m.insert(*k, i);
        }
        prop_assert_eq!(m.len(), keys.len());
        for (i, k) in keys.iter().enumerate() {
            prop_assert_eq!(m.get(k), Some(&i));
        }
    }

    #[test]
    fn prop_float_keys_match_model(ops in proptest::collection::vec((any::<bool>(), -50i32..50), 1..200)) {
        let mut m: BucketMap<f64, i32, FloatKeys> = BucketMap::with_keys(FloatKeys::new());
        let mut model: HashMap<i32, i32> = HashMap::new();
        for (insert, n) in ops {
            // Quarter steps, so -0.0 shows up as n == 0 with a sign flip.
            let key = if n == 0 && insert { -0.0 } else { f64::from(n) / 4.0 };
            if insert {
                prop_assert_eq!(m.insert(key, n), model.insert(n, n));
            } else {
                prop_assert_eq!(m.remove(&key), model.remove(&n));
            }
        }
        prop_assert_eq!(m.len(), model.len());
        for (n, v) in &model {
            prop_assert_eq!(m.get(&(f64::from(*n) / 4.0)), Some(v));
        }
    }
}

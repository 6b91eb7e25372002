#![cfg(test)]

// Property tests for BucketMap kept inside the crate so they can inspect
// growth state that the public API only summarizes.

use crate::iter::Cursor;
use crate::keys::{KeyCapability, StdKeys};
use crate::map::BucketMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Clone, Debug)]
enum Op {
    Insert(u32, i64),
    Remove(u32),
    Get(u32),
    Mutate(u32, i64),
    Iterate,
    StartCursor,
    Step(u8),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    (1u32..300).prop_flat_map(|space| {
        let k = 0..space;
        let op = prop_oneof![
            6 => (k.clone(), any::<i64>()).prop_map(|(k, v)| Op::Insert(k, v)),
            3 => k.clone().prop_map(Op::Remove),
            2 => k.clone().prop_map(Op::Get),
            1 => (k.clone(), any::<i64>()).prop_map(|(k, d)| Op::Mutate(k, d)),
            1 => Just(Op::Iterate),
            1 => Just(Op::StartCursor),
            2 => (1u8..16).prop_map(Op::Step),
        ];
        proptest::collection::vec(op, 1..400)
    })
}

/// A traversal in flight, checked against the model.
struct Traversal {
    cursor: Cursor,
    /// Present at the start and not removed since.
    stable: HashSet<u32>,
    yielded: HashMap<u32, usize>,
}

impl Traversal {
    fn step<C: KeyCapability<u32>>(
        &mut self,
        sut: &BucketMap<u32, i64, C>,
        model: &HashMap<u32, i64>,
    ) -> Result<bool, TestCaseError> {
        match self.cursor.next(sut) {
            Some((k, v)) => {
                // Reflexive keys are always re-read from the live entry.
                prop_assert_eq!(model.get(k), Some(v));
                *self.yielded.entry(*k).or_insert(0) += 1;
                Ok(true)
            }
            None => {
                for k in &self.stable {
                    prop_assert_eq!(self.yielded.get(k).copied(), Some(1), "key {}", k);
                }
                Ok(false)
            }
        }
    }
}

fn run<C: KeyCapability<u32>>(
    mut sut: BucketMap<u32, i64, C>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<u32, i64> = HashMap::new();
    let mut walk: Option<Traversal> = None;

    for op in ops {
        match op {
            Op::Insert(k, v) => {
                prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
            }
            Op::Remove(k) => {
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                if let Some(w) = walk.as_mut() {
                    w.stable.remove(&k);
                }
            }
            Op::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            Op::Mutate(k, d) => {
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
            }
            Op::Iterate => {
                let got: BTreeSet<(u32, i64)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
                let want: BTreeSet<(u32, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
                prop_assert_eq!(got.len(), sut.len());
                prop_assert_eq!(got, want);
            }
            Op::StartCursor => {
                if let Some(mut w) = walk.take() {
                    while w.step(&sut, &model)? {}
                }
                walk = Some(Traversal {
                    cursor: sut.cursor(),
                    stable: model.keys().copied().collect(),
                    yielded: HashMap::new(),
                });
            }
            Op::Step(n) => {
                if let Some(w) = walk.as_mut() {
                    for _ in 0..n {
                        if !w.step(&sut, &model)? {
                            walk = None;
                            break;
                        }
                    }
                }
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let stats = sut.stats();
        if !stats.growing && !stats.same_size_grow && stats.buckets > 0 {
            prop_assert!(!crate::growth::over_load_factor(stats.len, stats.exponent + 1));
        }
    }

    if let Some(mut w) = walk {
        while w.step(&sut, &model)? {}
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap,
// with detached cursors interleaved with writes.
// - insert/remove return the previous value like the model.
// - get/contains_key/len parity after every op.
// - A cursor yields live values only, and every key present when it
//   started and never removed exactly once, across any growths.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        run(BucketMap::with_keys(StdKeys::new()), ops)?;
    }

    #[test]
    fn prop_state_machine_presized(hint in 0usize..500, ops in arb_ops()) {
        run(BucketMap::with_capacity_and_keys(hint, StdKeys::new()), ops)?;
    }
}

// Collision variant: every key lands in bucket 0 with the same tag, so
// lookups walk long overflow chains and every evacuation keeps them together.
#[derive(Clone, Copy, Debug, Default)]
struct Collide;

impl KeyCapability<u32> for Collide {
    fn hash(&self, _key: &u32, _seed: u64) -> u64 {
        0
    }

    fn equals(&self, a: &u32, b: &u32) -> bool {
        a == b
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_colliding(ops in arb_ops()) {
        run(BucketMap::with_keys(Collide), ops)?;
    }
}

//! Key capabilities: how a map hashes and compares its keys.
//!
//! The table never calls `Hash`/`Eq` directly; everything goes through the
//! capability supplied at creation. This lets an embedder plug in its own
//! per-type functions and describe keys that are not equal to themselves.

use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use hashbrown::hash_map::DefaultHashBuilder;

pub trait KeyCapability<K: ?Sized> {
    /// Hash `key` perturbed by the per-map `seed`.
    fn hash(&self, key: &K, seed: u64) -> u64;

    fn equals(&self, a: &K, b: &K) -> bool;

    /// Every key equals itself. When false, evacuation and cursors route
    /// keys that fail `equals(k, k)` by their stored tag instead of their
    /// (unrepeatable) hash.
    fn is_reflexive(&self) -> bool {
        true
    }

    /// Overwriting an entry also stores the new, equal key.
    fn needs_key_update(&self) -> bool {
        false
    }

    /// Maps over unhashable keys cannot be created.
    fn is_hashable(&self) -> bool {
        true
    }
}

/// Capability for any `K: Hash + Eq`.
#[derive(Clone, Debug, Default)]
pub struct StdKeys<S = DefaultHashBuilder> {
    hasher: S,
}

impl StdKeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> StdKeys<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<K, S> KeyCapability<K> for StdKeys<S>
where
    K: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K, seed: u64) -> u64 {
        let mut h = self.hasher.build_hasher();
        h.write_u64(seed);
        key.hash(&mut h);
        h.finish()
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// IEEE float keys: `NaN != NaN`, `-0.0 == +0.0`.
///
/// NaN hashes to a fresh random value on every call, so a NaN key can be
/// inserted any number of times and never found again.
#[derive(Clone, Debug, Default)]
pub struct FloatKeys<S = DefaultHashBuilder> {
    hasher: S,
}

impl FloatKeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> FloatKeys<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

macro_rules! float_capability {
    ($float:ty) => {
        impl<S: BuildHasher> KeyCapability<$float> for FloatKeys<S> {
            fn hash(&self, key: &$float, seed: u64) -> u64 {
                if key.is_nan() {
                    return rand::random::<u64>();
                }
                // +0.0 and -0.0 compare equal, so they must hash alike.
                let bits = if *key == 0.0 { 0 } else { key.to_bits() };
                let mut h = self.hasher.build_hasher();
                h.write_u64(seed);
                bits.hash(&mut h);
                h.finish()
            }

            #[inline]
            fn equals(&self, a: &$float, b: &$float) -> bool {
                a == b
            }

            fn is_reflexive(&self) -> bool {
                false
            }

            fn needs_key_update(&self) -> bool {
                true
            }
        }
    };
}

float_capability!(f32);
float_capability!(f64);

/// Function-pointer bundle for embedders that supply per-type hash and
/// equality at run time.
pub struct KeyOps<K: ?Sized> {
    pub hash: Option<fn(&K, u64) -> u64>,
    pub equals: fn(&K, &K) -> bool,
    pub reflexive: bool,
    pub update_key: bool,
}

impl<K: ?Sized> Clone for KeyOps<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ?Sized> Copy for KeyOps<K> {}

impl<K: ?Sized> fmt::Debug for KeyOps<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOps")
            .field("hashable", &self.hash.is_some())
            .field("reflexive", &self.reflexive)
            .field("update_key", &self.update_key)
            .finish()
    }
}

impl<K: ?Sized> KeyCapability<K> for KeyOps<K> {
    #[inline]
    fn hash(&self, key: &K, seed: u64) -> u64 {
        match self.hash {
            Some(f) => f(key, seed),
            None => crate::fatal::Fatal::UnsupportedKey.raise(),
        }
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (self.equals)(a, b)
    }

    fn is_reflexive(&self) -> bool {
        self.reflexive
    }

    fn needs_key_update(&self) -> bool {
        self.update_key
    }

    fn is_hashable(&self) -> bool {
        self.hash.is_some()
    }
}

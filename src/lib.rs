//! bucket-map: an open-chained hash map that grows incrementally and
//! keeps cursors consistent while it grows.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: the hash table engine behind a language's built-in map type:
//!   O(1) average lookup/insert/remove, growth without a stop-the-world
//!   rehash, and traversal that survives writes and growth.
//! - Layers:
//!   - Tag, Slot, Bucket: 8-slot buckets holding a tag per slot, then the
//!     keys, then the values, plus a link to an overflow bucket.
//!   - BucketArray: one generation of `2^B` buckets and the slotmap arena
//!     owning its overflow buckets.
//!   - RawTable: count, exponent, seed, the current and old generation and
//!     the evacuation cursor; lookup, insert and remove; growth work.
//!   - BucketMap: public API. Owns the key capability and the state flags
//!     and wraps every write in the write-in-progress check.
//!   - Cursor/Iter: randomized traversal that pins the generations it reads.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics, no locks).
//! - Growth work is bounded per write: at most two old buckets move per
//!   insert or remove.
//! - Keys are hashed and compared only through a `KeyCapability`
//!   supplied at construction.
//!
//! Tags
//! - A slot's tag is either the top byte of its hash (lifted out of the
//!   marker range) or one of four markers: empty, empty when evacuated,
//!   moved to the lower half, moved to the upper half. A bucket is
//!   evacuated iff its first tag is an evacuated marker.
//!
//! Growth
//! - Doubling when the average load would exceed 6.5 entries per bucket.
//! - Same-size growth when overflow buckets are about as many as buckets;
//!   this compacts chains fragmented by removals.
//! - While growing, a write first evacuates the old bucket its key maps
//!   to, then the bucket at the evacuation cursor. Lookups read the old
//!   bucket until it is evacuated.
//!
//! Cursors
//! - A cursor snapshots the current generation and pins it (an `Rc<()>`
//!   clone), so the generation outlives its replacement for as long as the
//!   cursor needs it. While a live cursor pins the old generation,
//!   evacuation copies entries instead of moving them.
//! - Started mid-growth, a cursor reads unevacuated old buckets and keeps
//!   only the entries that will land in the new bucket it is visiting.
//! - An entry found moved is re-read through the map: the live value is
//!   reported, and a removed entry is skipped.
//! - Keys not equal to themselves (NaN) cannot be re-read or rehashed
//!   repeatably; evacuation routes them by their tag's low bit so every
//!   cursor's earlier decision holds.
//!
//! Failure model
//! - Missing keys are `None`. Misuse (a write through an absent map, a
//!   write overlapping another operation, a cursor used with the wrong map,
//!   a size hint above `MAX_SIZE_HINT`)
//!   and broken invariants are fatal: they panic with `fatal error: ...`.
//! - A panic during a write leaves the map poisoned; every later
//!   operation reports a concurrent write.
//!
//! Notes and non-goals
//! - No thread-safety, persistence or wire format.
//! - Tables never shrink.
//! - Mutating methods require `K: Clone, V: Clone` for the copy-on-evacuate
//!   path. Keys and values wider than 128 bytes are stored behind an `Rc`,
//!   which makes that copy a pointer copy.

mod bucket;
mod fatal;
mod flags;
mod growth;
mod iter;
mod keys;
mod map;
mod map_proptest;
pub mod ops;
mod slot;
mod table;
mod tag;

// Public surface
pub use bucket::BUCKET_CNT;
pub use fatal::Fatal;
pub use iter::{Cursor, Iter, Keys, Values};
pub use keys::{FloatKeys, KeyCapability, KeyOps, StdKeys};
pub use map::{BucketMap, MapStats, MAX_SIZE_HINT};
pub use slot::{SlotLayout, MAX_INLINE_SIZE};

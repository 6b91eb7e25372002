//! Map state flags and the write-in-progress detector.
//!
//! Single-threaded structure to detect a write overlapping another write,
//! a lookup or a cursor step. It is a correctness assertion, not a lock:
//! it fails fast instead of letting two mutations interleave.

use crate::fatal::Fatal;
use core::cell::Cell;
use core::marker::PhantomData;

/// There may be a cursor using the current bucket array.
pub(crate) const ITERATOR: u8 = 1;
/// There may be a cursor using the old bucket array.
pub(crate) const OLD_ITERATOR: u8 = 2;
/// A mutating operation is in progress.
pub(crate) const WRITING: u8 = 4;
/// The current growth keeps the bucket count unchanged.
pub(crate) const SAME_SIZE_GROW: u8 = 8;

/// Cursor, growth and write bits of one map.
#[derive(Debug)]
pub(crate) struct MapFlags {
    bits: Cell<u8>,
    // Keep !Send + !Sync in line with single-owner design.
    _nosend: PhantomData<*mut ()>,
}

impl MapFlags {
    pub(crate) const fn new() -> Self {
        Self {
            bits: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn contains(&self, flag: u8) -> bool {
        self.bits.get() & flag != 0
    }

    #[inline]
    pub(crate) fn insert(&self, flag: u8) {
        self.bits.set(self.bits.get() | flag);
    }

    #[inline]
    pub(crate) fn remove(&self, flag: u8) {
        self.bits.set(self.bits.get() & !flag);
    }

    /// Enter a write section. Fatal if a write is already in progress.
    #[inline]
    pub(crate) fn begin_write(&self) -> WriteGuard<'_> {
        if self.contains(WRITING) {
            Fatal::ConcurrentWrite.raise();
        }
        self.insert(WRITING);
        WriteGuard { owner: self }
    }

    #[inline]
    pub(crate) fn is_writing(&self) -> bool {
        self.contains(WRITING)
    }

    #[inline]
    pub(crate) fn assert_readable(&self) {
        if self.contains(WRITING) {
            Fatal::ConcurrentReadWrite.raise();
        }
    }

    #[inline]
    pub(crate) fn assert_iterable(&self) {
        if self.contains(WRITING) {
            Fatal::ConcurrentIterationWrite.raise();
        }
    }

    /// Record that a cursor may observe both generations.
    #[inline]
    pub(crate) fn note_cursor(&self) {
        if self.bits.get() & (ITERATOR | OLD_ITERATOR) != ITERATOR | OLD_ITERATOR {
            self.insert(ITERATOR | OLD_ITERATOR);
        }
    }

    /// Shift cursor flags at growth start: cursors over the outgoing
    /// array become cursors over the old generation.
    pub(crate) fn rotate_cursor_flags(&self, outgoing_pinned: bool) {
        let had_iterator = self.contains(ITERATOR);
        self.remove(ITERATOR | OLD_ITERATOR);
        if had_iterator && outgoing_pinned {
            self.insert(OLD_ITERATOR);
        }
    }
}

impl Default for MapFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `MapFlags::begin_write`.
///
/// Dropped during a panic it leaves the write flag set: the structure may
/// be half-updated, so every later operation reports a conflicting write.
pub(crate) struct WriteGuard<'a> {
    owner: &'a MapFlags,
}

impl<'a> Drop for WriteGuard<'a> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if !self.owner.contains(WRITING) {
            Fatal::ConcurrentWrite.raise();
        }
        self.owner.remove(WRITING);
    }
}

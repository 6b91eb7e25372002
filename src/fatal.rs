//! Unrecoverable map conditions.
//!
//! These are programmer errors or signs of memory corruption, never
//! ordinary runtime outcomes: a missing key is an `Option::None`, not a
//! `Fatal`. Every variant is raised by panicking with its message.

use core::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fatal {
    /// `set` through an absent map handle.
    NilMapWrite,
    /// `delete` through an absent map handle.
    NilMapDelete,
    /// A write started while another write was in progress.
    ConcurrentWrite,
    /// A lookup observed a write in progress.
    ConcurrentReadWrite,
    /// A cursor step observed a write in progress.
    ConcurrentIterationWrite,
    /// The key capability cannot hash keys.
    UnsupportedKey,
    /// A size hint outside the range a map can be created with.
    SizeOutOfRange,
    /// Bucket bookkeeping is inconsistent.
    BadMapState,
    /// A cursor was stepped against a map it did not come from.
    ForeignCursor,
}

impl Fatal {
    pub fn message(self) -> &'static str {
        match self {
            Fatal::NilMapWrite => "assignment to entry in nil map",
            Fatal::NilMapDelete => "delete from nil map",
            Fatal::ConcurrentWrite => "concurrent map writes",
            Fatal::ConcurrentReadWrite => "concurrent map read and map write",
            Fatal::ConcurrentIterationWrite => "concurrent map iteration and map write",
            Fatal::UnsupportedKey => "unsupported map key type",
            Fatal::SizeOutOfRange => "makemap: size out of range",
            Fatal::BadMapState => "bad map state",
            Fatal::ForeignCursor => "cursor used with a different map",
        }
    }

    /// Abort the current operation.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn raise(self) -> ! {
        panic!("fatal error: {}", self.message())
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Fatal {}

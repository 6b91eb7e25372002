//! Per-slot tag: a hash-prefix filter for live entries, or a state marker.

/// Smallest top-hash value of a filled slot. Byte values below it are
/// taken by the markers.
pub(crate) const MIN_TOP_HASH: u8 = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Tag {
    /// Slot is free.
    Empty,
    /// Slot was free when its bucket was evacuated.
    EvacuatedEmpty,
    /// Entry moved to the lower half of the larger array (or the same
    /// bucket on a same-size growth).
    EvacuatedLow,
    /// Entry moved to the upper half of the larger array.
    EvacuatedHigh,
    /// Live entry; carries the top byte of its hash.
    Filled(u8),
}

/// High byte of `hash`, lifted out of the marker range.
#[inline]
pub(crate) fn top_hash(hash: u64) -> u8 {
    let top = (hash >> 56) as u8;
    if top < MIN_TOP_HASH {
        top + MIN_TOP_HASH
    } else {
        top
    }
}

impl Tag {
    #[inline]
    pub(crate) fn is_evacuated(self) -> bool {
        matches!(
            self,
            Tag::EvacuatedEmpty | Tag::EvacuatedLow | Tag::EvacuatedHigh
        )
    }

    /// True for slots that hold no entry for a cursor to report.
    #[inline]
    pub(crate) fn is_vacant(self) -> bool {
        matches!(self, Tag::Empty | Tag::EvacuatedEmpty)
    }

    /// Entry moved to a newer generation; its data here may be a copy.
    #[inline]
    pub(crate) fn is_moved(self) -> bool {
        matches!(self, Tag::EvacuatedLow | Tag::EvacuatedHigh)
    }

    /// Low bit used to route keys that are not equal to themselves.
    /// The two moved markers differ in exactly this bit.
    #[inline]
    pub(crate) fn low_bit(self) -> u8 {
        match self {
            Tag::EvacuatedLow => 0,
            Tag::EvacuatedHigh => 1,
            Tag::Filled(top) => top & 1,
            Tag::Empty | Tag::EvacuatedEmpty => 0,
        }
    }
}

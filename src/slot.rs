//! Key/value storage for one bucket slot: inline, or out-of-line when the
//! type is wider than `MAX_INLINE_SIZE`.

use core::mem;
use std::rc::Rc;

/// Widest key or value kept inline in a bucket.
pub const MAX_INLINE_SIZE: usize = 128;

/// Size, alignment and placement of a key or value type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlotLayout {
    pub size: usize,
    pub align: usize,
    pub indirect: bool,
}

impl SlotLayout {
    pub const fn of<T>() -> Self {
        let size = mem::size_of::<T>();
        Self {
            size,
            align: mem::align_of::<T>(),
            indirect: size > MAX_INLINE_SIZE,
        }
    }
}

/// Indirect storage is shared on copy, so an evacuation that must keep
/// the old slot readable copies a pointer rather than the payload.
#[derive(Clone, Debug)]
pub(crate) enum Slot<T> {
    Inline(T),
    Indirect(Rc<T>),
}

impl<T> Slot<T> {
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        if SlotLayout::of::<T>().indirect {
            Slot::Indirect(Rc::new(value))
        } else {
            Slot::Inline(value)
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> &T {
        match self {
            Slot::Inline(v) => v,
            Slot::Indirect(rc) => &**rc,
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Mutable access; an indirect payload still shared with an old
    /// generation is split off first.
    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        match self {
            Slot::Inline(v) => v,
            Slot::Indirect(rc) => Rc::make_mut(rc),
        }
    }

    pub(crate) fn into_inner(self) -> T {
        match self {
            Slot::Inline(v) => v,
            Slot::Indirect(rc) => Rc::try_unwrap(rc).unwrap_or_else(|rc| (*rc).clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_types_stay_inline() {
        assert!(!SlotLayout::of::<u64>().indirect);
        assert!(!SlotLayout::of::<[u8; MAX_INLINE_SIZE]>().indirect);
        assert!(matches!(Slot::new(5u32), Slot::Inline(5)));
    }

    #[test]
    fn wide_types_go_out_of_line() {
        let layout = SlotLayout::of::<[u8; MAX_INLINE_SIZE + 1]>();
        assert!(layout.indirect);
        assert_eq!(layout.size, MAX_INLINE_SIZE + 1);
        let s = Slot::new([7u8; 200]);
        assert!(matches!(s, Slot::Indirect(_)));
        assert_eq!(s.get()[199], 7);
    }

    #[test]
    fn shared_indirect_payload_is_split_on_write() {
        let mut a = Slot::new([1u64; 32]);
        let b = a.clone();
        a.get_mut()[0] = 9;
        assert_eq!(a.get()[0], 9);
        assert_eq!(b.get()[0], 1);
        assert_eq!(b.into_inner()[0], 1);
    }
}

//! Mark bitmap implementation for slot-level object marking.
//!
//! One bit per memory slot. Bits are only ever set: a trial never clears a
//! mark, and a fresh bitmap is created for every trial.

use crate::heap::Slot;

const BITS_PER_WORD: usize = u64::BITS as usize;

/// A slot-indexed bitmap recording which objects are known reachable.
///
/// The same type backs the trial's mark set and the transient reachability
/// sets computed when choosing heap targets or checking the invariant.
///
/// # Example
///
/// ```
/// use gc_rescan::heap::Slot;
/// use gc_rescan::gc::mark::MarkBitmap;
///
/// let mut bitmap = MarkBitmap::new(6);
/// assert_eq!(bitmap.capacity(), 6);
/// assert!(!bitmap.is_marked(Slot(3)));
///
/// assert!(bitmap.mark(Slot(3)));
/// assert!(bitmap.is_marked(Slot(3)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkBitmap {
    /// Bitmap storage, one bit per slot.
    bitmap: Vec<u64>,
    /// Number of slots covered.
    capacity: usize,
    /// Number of marked slots.
    marked_count: usize,
}

impl MarkBitmap {
    /// Create an all-clear bitmap covering `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bitmap: vec![0; capacity.div_ceil(BITS_PER_WORD)],
            capacity,
            marked_count: 0,
        }
    }

    /// Number of slots covered.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of marked slots.
    #[must_use]
    pub const fn marked_count(&self) -> usize {
        self.marked_count
    }

    /// Set the bit for `slot`. Returns `true` if it was previously clear.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the bitmap.
    pub fn mark(&mut self, slot: Slot) -> bool {
        let (word, mask) = self.locate(slot);
        let prev = self.bitmap[word];
        if prev & mask != 0 {
            return false;
        }
        self.bitmap[word] = prev | mask;
        self.marked_count += 1;
        true
    }

    /// Check the bit for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the bitmap.
    #[must_use]
    pub fn is_marked(&self, slot: Slot) -> bool {
        let (word, mask) = self.locate(slot);
        self.bitmap[word] & mask != 0
    }

    /// Marked slots in ascending order.
    pub fn iter_marked(&self) -> impl Iterator<Item = Slot> + '_ {
        (0..self.capacity)
            .map(Slot)
            .filter(move |&slot| self.is_marked(slot))
    }

    fn locate(&self, slot: Slot) -> (usize, u64) {
        assert!(
            slot.index() < self.capacity,
            "slot {slot} outside mark bitmap of {} slots",
            self.capacity
        );
        let word = slot.index() / BITS_PER_WORD;
        let bit = slot.index() % BITS_PER_WORD;
        (word, 1u64 << bit)
    }
}

#[cfg(test)]
mod tests {
    use super::MarkBitmap;
    use crate::heap::Slot;

    #[test]
    fn test_mark_bitmap_new() {
        let bitmap = MarkBitmap::new(6);
        assert_eq!(bitmap.capacity(), 6);
        assert_eq!(bitmap.marked_count(), 0);
        assert_eq!(bitmap.iter_marked().count(), 0);
    }

    #[test]
    fn test_mark_bitmap_mark_is_marked() {
        let mut bitmap = MarkBitmap::new(130);

        assert!(!bitmap.is_marked(Slot(0)));
        assert!(!bitmap.is_marked(Slot(129)));

        bitmap.mark(Slot(0));
        bitmap.mark(Slot(64));
        bitmap.mark(Slot(129));

        assert!(bitmap.is_marked(Slot(0)));
        assert!(bitmap.is_marked(Slot(64)));
        assert!(bitmap.is_marked(Slot(129)));
        assert!(!bitmap.is_marked(Slot(1)));
        assert_eq!(
            bitmap.iter_marked().collect::<Vec<_>>(),
            vec![Slot(0), Slot(64), Slot(129)]
        );
    }

    #[test]
    fn test_mark_bitmap_idempotent() {
        let mut bitmap = MarkBitmap::new(6);

        assert!(bitmap.mark(Slot(4)));
        assert!(!bitmap.mark(Slot(4)));
        assert!(!bitmap.mark(Slot(4)));

        assert_eq!(bitmap.marked_count(), 1);
    }

    #[test]
    #[should_panic(expected = "outside mark bitmap")]
    fn test_mark_bitmap_out_of_range() {
        let mut bitmap = MarkBitmap::new(6);
        bitmap.mark(Slot(6));
    }
}

use std::num::NonZeroUsize;
use std::ops::Range;

/// Which collection a [`WorkItem`] ranges over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Documents,
    Patterns,
}

/// Decides when a range is small enough to run as a leaf and where to cut it
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionPolicy;

impl PartitionPolicy {
    /// Leaf granularity for a collection of `initial_size` items:
    /// the caller's override, or half the collection (at least one).
    /// The default splits a collection once and then stops.
    pub fn min_split_size(initial_size: usize, explicit: Option<NonZeroUsize>) -> usize {
        explicit.map_or_else(|| (initial_size / 2).max(1), NonZeroUsize::get)
    }

    /// A single item is never split, whatever the threshold
    pub fn should_split(size: usize, min_split_size: usize) -> bool {
        size >= 2 && size > min_split_size
    }

    /// Midpoint, rounded down; both halves are non-empty when `size >= 2`
    pub fn split_point(size: usize) -> usize {
        size / 2
    }
}

/// An immutable `[start, end)` range over one axis of the search space.
///
/// `fixed` is the range of the other axis that every element of this item
/// is searched against. Splitting produces two new items and leaves this
/// one untouched, so no task ever mutates state another task can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub axis: Axis,
    pub start: usize,
    pub end: usize,
    pub fixed: Range<usize>,
    pub min_split_size: usize,
    /// False when this axis must run as a single leaf
    pub parallel: bool,
}

impl WorkItem {
    pub fn new(
        axis: Axis,
        range: Range<usize>,
        fixed: Range<usize>,
        min_split_size: usize,
        parallel: bool,
    ) -> Self {
        Self {
            axis,
            start: range.start,
            end: range.end.max(range.start),
            fixed,
            min_split_size,
            parallel,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_leaf(&self) -> bool {
        !self.parallel || !PartitionPolicy::should_split(self.len(), self.min_split_size)
    }

    /// Cuts the item at its midpoint into `(left, right)`
    pub fn split(&self) -> (WorkItem, WorkItem) {
        let mid = self.start + PartitionPolicy::split_point(self.len());
        (
            WorkItem {
                end: mid,
                ..self.clone()
            },
            WorkItem {
                start: mid,
                ..self.clone()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_min_split_size() {
        assert_eq!(PartitionPolicy::min_split_size(0, None), 1);
        assert_eq!(PartitionPolicy::min_split_size(1, None), 1);
        assert_eq!(PartitionPolicy::min_split_size(7, None), 3);
        assert_eq!(PartitionPolicy::min_split_size(100, None), 50);
        assert_eq!(
            PartitionPolicy::min_split_size(100, NonZeroUsize::new(3)),
            3
        );
    }

    #[test]
    fn test_single_item_never_splits() {
        assert!(!PartitionPolicy::should_split(1, 1));
        assert!(!PartitionPolicy::should_split(0, 1));
        assert!(PartitionPolicy::should_split(2, 1));
    }

    #[test]
    fn test_default_splits_once_then_stops() {
        let min = PartitionPolicy::min_split_size(8, None);
        let root = WorkItem::new(Axis::Documents, 0..8, 0..3, min, true);
        assert!(!root.is_leaf());

        let (left, right) = root.split();
        assert!(left.is_leaf());
        assert!(right.is_leaf());

        // Odd sizes put the extra item on the right, which splits once more
        let min = PartitionPolicy::min_split_size(5, None);
        let (left, right) = WorkItem::new(Axis::Patterns, 0..5, 0..1, min, true).split();
        assert_eq!(left.range(), 0..2);
        assert_eq!(right.range(), 2..5);
        assert!(left.is_leaf());
        assert!(!right.is_leaf());

        let (right_left, right_right) = right.split();
        assert_eq!(right_left.range(), 2..3);
        assert_eq!(right_right.range(), 3..5);
        assert!(right_left.is_leaf() && right_right.is_leaf());
    }

    #[test]
    fn test_split_halves_are_non_empty_and_cover_range() {
        for size in 2..40 {
            let item = WorkItem::new(Axis::Documents, 10..10 + size, 0..4, 1, true);
            let (left, right) = item.split();
            assert!(!left.is_empty() && !right.is_empty());
            assert_eq!(left.start, item.start);
            assert_eq!(left.end, right.start);
            assert_eq!(right.end, item.end);
            assert_eq!(left.fixed, item.fixed);
            assert_eq!(right.fixed, item.fixed);
        }
    }

    #[test]
    fn test_sequential_item_is_always_leaf() {
        let item = WorkItem::new(Axis::Documents, 0..1000, 0..4, 1, false);
        assert!(item.is_leaf());
    }
}

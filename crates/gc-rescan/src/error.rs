//! Trial faults and configuration errors.

use thiserror::Error;

use crate::heap::Slot;

/// Outcome of a failed trial.
///
/// There is exactly one way for a trial to fail: the final check found an
/// object that is reachable from a root but carries no mark bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// `slot` is reachable from `root` but was never marked.
    ///
    /// `root` is the global root or the stack slot whose pointer the check
    /// walked from.
    #[error("object not marked: {slot} (reachable from root {root})")]
    MissedObject {
        /// The unmarked object.
        slot: Slot,
        /// Global root or stack slot the object is reachable from.
        root: Slot,
    },
}

impl Fault {
    /// The unmarked slot.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        match *self {
            Self::MissedObject { slot, .. } => slot,
        }
    }

    /// The root the unmarked slot was reached from.
    #[must_use]
    pub const fn root(&self) -> Slot {
        match *self {
            Self::MissedObject { root, .. } => root,
        }
    }
}

/// Rejected trial input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration has no mutator threads.
    #[error("at least one mutator thread is required")]
    ZeroThreads,

    /// The thread count leaves no room for null and the global root.
    #[error("{num_threads} threads do not fit in memory")]
    TooManyThreads {
        /// Requested number of threads.
        num_threads: usize,
    },

    /// The layout has no room for the global root.
    #[error("{num_slots} slots cannot hold null, the stacks and a heap (need at least {required})")]
    TooFewSlots {
        /// Configured number of slots.
        num_slots: usize,
        /// Smallest slot count that fits the stacks and a heap.
        required: usize,
    },

    /// A supplied memory has a different number of slots than the
    /// configured layout.
    #[error("memory has {actual} slots but the configuration expects {expected}")]
    SlotCountMismatch {
        /// Slot count of the configuration.
        expected: usize,
        /// Slot count of the memory.
        actual: usize,
    },

    /// A supplied memory was laid out for a different number of threads.
    #[error("memory has {actual} stacks but the configuration expects {expected}")]
    ThreadCountMismatch {
        /// Thread count of the configuration.
        expected: usize,
        /// Stack count of the memory.
        actual: usize,
    },

    /// A supplied memory stores a pointer in the null slot.
    #[error("null slot holds pointers {left} and {right}")]
    NullSlotInUse {
        /// Left field of slot 0.
        left: Slot,
        /// Right field of slot 0.
        right: Slot,
    },

    /// A supplied memory stores a pointer in a stack's right field.
    #[error("stack slot {slot} has a right pointer to {target}")]
    StackRightInUse {
        /// The stack slot.
        slot: Slot,
        /// The pointer in its right field.
        target: Slot,
    },

    /// A supplied memory holds an out-of-range pointer.
    #[error("slot {slot} points to {target}, which is outside memory")]
    DanglingPointer {
        /// Slot holding the pointer.
        slot: Slot,
        /// The out-of-range pointer.
        target: Slot,
    },

    /// A supplied memory stores a stack pointer in the heap.
    #[error("heap slot {slot} points to stack slot {target}")]
    HeapPointsToStack {
        /// Slot holding the pointer.
        slot: Slot,
        /// The stack slot it points to.
        target: Slot,
    },

    /// Random exploration was asked to run without a trial bound.
    #[error("random exploration needs a maximum number of trials")]
    UnboundedRandom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_names_slot_and_root() {
        let fault = Fault::MissedObject {
            slot: Slot(5),
            root: Slot(3),
        };
        assert_eq!(
            fault.to_string(),
            "object not marked: 5 (reachable from root 3)"
        );
        assert_eq!(fault.slot(), Slot(5));
        assert_eq!(fault.root(), Slot(3));
    }
}

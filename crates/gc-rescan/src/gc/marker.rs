//! Transitive marking with explicit suspension points.
//!
//! `mark(p)` is the classic recursive marker:
//!
//! ```text
//! mark(p):
//!     if p is null or marked[p]: return
//!     marked[p] = true
//!     mark(p.left);  yield
//!     mark(p.right); yield
//! ```
//!
//! The two yields are the only places where marking can interleave with
//! other threads, so [`Marker`] keeps the recursion on an explicit frame
//! stack and returns [`MarkStep::Yield`] at exactly those points. The left
//! field is read in the same atomic step that marks `p`; the right field is
//! read when the marker resumes after the first yield.

use crate::heap::Slot;
use crate::trial::TrialState;

/// Who set a mark bit, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOrigin {
    /// The collector's root mark or a stack rescan.
    Collector,
    /// A transitive-mark write barrier.
    Barrier,
}

/// Result of advancing a [`Marker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkStep {
    /// Suspended after finishing a left or right subtree.
    Yield,
    /// The whole graph below the starting pointer is marked.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Call `mark(slot)`.
    Enter(Slot),
    /// Left subtree of `slot` finished; yield.
    LeftDone(Slot),
    /// Resume `slot` by marking its right field.
    EnterRight(Slot),
    /// Right subtree finished; yield.
    RightDone,
}

/// A suspended `mark(p)` call.
#[derive(Debug, Clone)]
pub struct Marker {
    frames: Vec<Frame>,
    origin: MarkOrigin,
}

impl Marker {
    /// Start marking from `start`.
    #[must_use]
    pub fn new(start: Slot, origin: MarkOrigin) -> Self {
        Self {
            frames: vec![Frame::Enter(start)],
            origin,
        }
    }

    /// Whether the marker has nothing left to do.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    /// Run until the next yield point or completion.
    ///
    /// Entering a null or already-marked pointer neither yields nor changes
    /// state.
    pub fn step(&mut self, state: &mut TrialState) -> MarkStep {
        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Enter(slot) => {
                    if slot.is_null() || !state.mark(slot, self.origin) {
                        continue;
                    }
                    let left = state.memory().left(slot);
                    self.frames.push(Frame::LeftDone(slot));
                    self.frames.push(Frame::Enter(left));
                }
                Frame::LeftDone(slot) => {
                    self.frames.push(Frame::EnterRight(slot));
                    return MarkStep::Yield;
                }
                Frame::EnterRight(slot) => {
                    let right = state.memory().right(slot);
                    self.frames.push(Frame::RightDone);
                    self.frames.push(Frame::Enter(right));
                }
                Frame::RightDone => return MarkStep::Yield,
            }
        }
        MarkStep::Done
    }

    /// Run to completion, returning how many yields were passed.
    pub fn finish(&mut self, state: &mut TrialState) -> usize {
        let mut yields = 0;
        while self.step(state) == MarkStep::Yield {
            yields += 1;
        }
        yields
    }
}

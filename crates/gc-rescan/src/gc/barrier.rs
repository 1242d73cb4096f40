//! Write barrier policies.
//!
//! Every heap pointer store made by a mutator goes through
//! [`WriteBarrier`]: it copies the pointer held in a stack slot into the
//! `left` field of a heap object. Before the store, the active
//! [`BarrierPolicy`] gets a chance to keep the published object alive:
//!
//! - [`TransitiveMark`] marks the object and everything below it while
//!   holding the stop-the-world lock in shared mode, so the collector cannot
//!   finish while the mark is in flight.
//! - [`ScanRestart`] resets the scan clock when the object is unmarked,
//!   forcing the collector to rescan every stack. It does not mark.
//! - [`Unbarriered`] does nothing; it exists to show the race the other two
//!   close.
//!
//! The policy is a type parameter, so each configuration is a separate
//! monomorphised instance of the same call site.

use std::marker::PhantomData;

use crate::gc::marker::{MarkOrigin, MarkStep, Marker};
use crate::heap::Slot;
use crate::sched::Step;
use crate::trial::TrialState;

/// What the barrier must do before storing the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierAction {
    /// Store right away.
    Publish,
    /// Transitively mark the slot under the shared stw lock, then store.
    MarkShared(Slot),
}

/// A write barrier algorithm.
pub trait BarrierPolicy: 'static {
    /// Name used in logs and reports.
    const NAME: &'static str;

    /// Inspect `value`, the pointer about to become heap visible.
    fn before_publish(state: &mut TrialState, value: Slot) -> BarrierAction;
}

/// Mark the published object transitively before the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveMark;

impl BarrierPolicy for TransitiveMark {
    const NAME: &'static str = "transitive-mark";

    fn before_publish(_state: &mut TrialState, value: Slot) -> BarrierAction {
        BarrierAction::MarkShared(value)
    }
}

/// Invalidate completed stack rescans when an unmarked object is published.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanRestart;

impl BarrierPolicy for ScanRestart {
    const NAME: &'static str = "scan-restart";

    fn before_publish(state: &mut TrialState, value: Slot) -> BarrierAction {
        if !value.is_null() && !state.is_marked(value) {
            state.restart_scan(value);
        }
        BarrierAction::Publish
    }
}

/// No barrier at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbarriered;

impl BarrierPolicy for Unbarriered {
    const NAME: &'static str = "unbarriered";

    fn before_publish(_state: &mut TrialState, _value: Slot) -> BarrierAction {
        BarrierAction::Publish
    }
}

#[derive(Debug, Clone)]
enum BarrierPhase {
    Start,
    AcquireShared(Slot),
    Marking(Marker),
    Publish,
    Published,
}

/// An in-flight `slot.left = source.left` store.
#[derive(Debug, Clone)]
pub struct WriteBarrier<P> {
    slot: Slot,
    source: Slot,
    phase: BarrierPhase,
    _policy: PhantomData<fn() -> P>,
}

impl<P: BarrierPolicy> WriteBarrier<P> {
    /// Prepare to copy the pointer held in `source` into `slot`.
    #[must_use]
    pub const fn new(slot: Slot, source: Slot) -> Self {
        Self {
            slot,
            source,
            phase: BarrierPhase::Start,
            _policy: PhantomData,
        }
    }

    /// Whether the barrier holds the shared stw lock.
    #[must_use]
    pub const fn holds_shared(&self) -> bool {
        matches!(self.phase, BarrierPhase::Marking(_))
    }

    /// Whether the barrier can make progress.
    #[must_use]
    pub const fn is_runnable(&self, state: &TrialState) -> bool {
        match self.phase {
            BarrierPhase::AcquireShared(_) => state.world().can_read(),
            _ => true,
        }
    }

    /// Run until the next suspension point.
    ///
    /// The store itself is followed by a yield; the call after that returns
    /// [`Step::Done`] without doing anything, so the caller continues in
    /// the same atomic step.
    pub fn step(&mut self, state: &mut TrialState) -> Step {
        loop {
            let next = match &mut self.phase {
                BarrierPhase::Start => {
                    let value = state.memory().left(self.source);
                    match P::before_publish(state, value) {
                        BarrierAction::Publish => BarrierPhase::Publish,
                        BarrierAction::MarkShared(value) => BarrierPhase::AcquireShared(value),
                    }
                }
                BarrierPhase::AcquireShared(value) => {
                    if !state.world_mut().try_read() {
                        return Step::Blocked;
                    }
                    BarrierPhase::Marking(Marker::new(*value, MarkOrigin::Barrier))
                }
                BarrierPhase::Marking(marker) => match marker.step(state) {
                    MarkStep::Yield => return Step::Yield,
                    MarkStep::Done => {
                        state.world_mut().read_unlock();
                        BarrierPhase::Publish
                    }
                },
                BarrierPhase::Publish => {
                    let value = state.memory().left(self.source);
                    state.memory_mut().set_left(self.slot, value);
                    state.metrics_mut().publications += 1;
                    #[cfg(feature = "tracing")]
                    crate::tracing::internal::log_publication(self.slot, value);
                    self.phase = BarrierPhase::Published;
                    return Step::Yield;
                }
                BarrierPhase::Published => return Step::Done,
            };
            self.phase = next;
        }
    }
}

//! Mutator threads.
//!
//! Each mutator runs its body once:
//!
//! ```text
//! x = ambiguous reachable heap object
//! write_barrier(x, own stack)     // ends with a yield
//! y = ambiguous reachable heap object
//! own stack.left = y.left         // plain load, no barrier
//! yield
//! ```
//!
//! The store publishes the stack's pointer into the heap and the load takes
//! a heap pointer onto the stack, which is the pattern that lets an object
//! escape a concurrent stack rescan.

use crate::error::Fault;
use crate::gc::barrier::{BarrierPolicy, WriteBarrier};
use crate::sched::{Context, Step, Task};
use crate::trial::TrialState;

#[derive(Debug, Clone)]
enum MutatorPhase<P> {
    Publish,
    Barrier(WriteBarrier<P>),
    Load,
    Loaded,
}

/// Mutator thread `thread` under barrier policy `P`.
#[derive(Debug, Clone)]
pub struct Mutator<P> {
    thread: usize,
    phase: MutatorPhase<P>,
}

impl<P: BarrierPolicy> Mutator<P> {
    /// Mutator owning the stack of `thread`.
    #[must_use]
    pub const fn new(thread: usize) -> Self {
        Self {
            thread,
            phase: MutatorPhase::Publish,
        }
    }

    /// Index of the thread.
    #[must_use]
    pub const fn thread(&self) -> usize {
        self.thread
    }
}

impl<P: BarrierPolicy> Task for Mutator<P> {
    fn name(&self) -> String {
        format!("mutator{}", self.thread)
    }

    fn is_runnable(&self, state: &TrialState) -> bool {
        match &self.phase {
            MutatorPhase::Barrier(barrier) => barrier.is_runnable(state),
            _ => true,
        }
    }

    fn step(&mut self, cx: &mut Context<'_>) -> Result<Step, Fault> {
        let stack = cx.state.memory().stack_slot(self.thread);
        loop {
            match &mut self.phase {
                MutatorPhase::Publish => {
                    let target = cx.ambiguous_reachable_heap_pointer();
                    self.phase = MutatorPhase::Barrier(WriteBarrier::new(target, stack));
                }
                MutatorPhase::Barrier(barrier) => match barrier.step(cx.state) {
                    Step::Done => self.phase = MutatorPhase::Load,
                    step => return Ok(step),
                },
                MutatorPhase::Load => {
                    let source = cx.ambiguous_reachable_heap_pointer();
                    let value = cx.state.memory().left(source);
                    cx.state.memory_mut().set_left(stack, value);
                    cx.state.metrics_mut().loads += 1;
                    self.phase = MutatorPhase::Loaded;
                    return Ok(Step::Yield);
                }
                MutatorPhase::Loaded => return Ok(Step::Done),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrialConfig;
    use crate::gc::barrier::{TransitiveMark, Unbarriered};
    use crate::heap::{Memory, Object, Slot};
    use crate::sched::strategy::Replay;
    use crate::sched::Scheduler;

    /// stack0 -> 4; root(3) -> 5, 4.
    fn state() -> TrialState {
        TrialState::new(
            Memory::from_objects(
                &TrialConfig::default(),
                vec![
                    Object::default(),
                    Object::new(Slot(4), Slot::NULL),
                    Object::default(),
                    Object::new(Slot(5), Slot(4)),
                    Object::default(),
                    Object::new(Slot(4), Slot::NULL),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_publish_then_load() {
        let mut state = state();
        let mut scheduler = Scheduler::new();
        scheduler.spawn(Mutator::<Unbarriered>::new(0));

        // Publish into the second reachable heap object (4), then load from
        // the first (the root).
        let mut chooser = Replay::new(vec![1, 0]);
        scheduler.step(&mut state, &mut chooser).unwrap();
        assert_eq!(state.memory().left(Slot(4)), Slot(4));
        assert_eq!(state.metrics().publications, 1);

        scheduler.step(&mut state, &mut chooser).unwrap();
        assert_eq!(state.memory().left(Slot(1)), Slot(5));
        assert_eq!(state.metrics().loads, 1);

        scheduler.wait_all(&mut state, &mut chooser).unwrap();
        assert!(scheduler.is_empty());
        assert_eq!(state.metrics().steps, 3);
        assert_eq!(state.metrics().yields, 2);
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn test_blocked_barrier_is_not_rescheduled() {
        let mut state = state();
        assert!(state.world_mut().try_write());
        let mut scheduler = Scheduler::new();
        scheduler.spawn(Mutator::<TransitiveMark>::new(0));

        scheduler.step(&mut state, &mut Replay::default()).unwrap();
        assert_eq!(state.metrics().yields, 0);
        assert_eq!(state.marks().marked_count(), 0);

        // The only thread waits on the exclusive holder.
        scheduler.step(&mut state, &mut Replay::default()).unwrap();
    }

    #[test]
    fn test_name() {
        assert_eq!(Mutator::<Unbarriered>::new(1).name(), "mutator1");
        assert_eq!(Mutator::<Unbarriered>::new(1).thread(), 1);
    }
}

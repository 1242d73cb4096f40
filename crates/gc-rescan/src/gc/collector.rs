//! The collector thread.
//!
//! One collector cycle walks through [`CollectorPhase`] in order:
//!
//! 1. `Marking`: transitively mark the global root, then spawn the mutators.
//! 2. `Rescanning`: while the scan clock is below the thread count, advance
//!    it and mark whatever the next stack currently points to. A
//!    scan-restart barrier may push the clock back to zero at any yield.
//! 3. `Draining`: take the stop-the-world lock exclusively. This waits for
//!    every barrier that is still marking under the shared lock.
//! 4. `Checking`: verify that everything reachable is marked.
//! 5. `Done`: release the lock.

use std::marker::PhantomData;

use crate::config::TrialConfig;
use crate::error::Fault;
use crate::gc::barrier::BarrierPolicy;
use crate::gc::checker::check_roots;
use crate::gc::marker::{MarkOrigin, MarkStep, Marker};
use crate::mutator::Mutator;
use crate::sched::{Context, Step, Task};
use crate::trial::TrialState;

/// Collector progress through one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorPhase {
    /// Marking from the global root.
    Marking,
    /// Rescanning thread stacks.
    Rescanning,
    /// Waiting for the exclusive stw lock.
    Draining,
    /// Verifying mark completeness under the exclusive lock.
    Checking,
    /// Cycle complete.
    Done,
}

impl CollectorPhase {
    /// Check if transition to target phase is valid.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Marking, Self::Rescanning)
                | (Self::Rescanning, Self::Draining)
                | (Self::Draining, Self::Checking)
                | (Self::Checking, Self::Done)
        )
    }
}

/// The collector thread under barrier policy `P`.
///
/// `P` only matters for the mutators it spawns.
#[derive(Debug)]
pub struct Collector<P> {
    marker: Option<Marker>,
    spawn_mutators: bool,
    max_rescans: Option<usize>,
    rescans: usize,
    _policy: PhantomData<fn() -> P>,
}

impl<P: BarrierPolicy> Collector<P> {
    /// Collector honouring the rescan budget of `config`.
    #[must_use]
    pub const fn new(config: &TrialConfig) -> Self {
        Self {
            marker: None,
            spawn_mutators: true,
            max_rescans: config.max_rescans,
            rescans: 0,
            _policy: PhantomData,
        }
    }

    /// Do not start any mutator after the root mark. Stacks are then only
    /// changed by whoever drives the trial.
    #[must_use]
    pub const fn without_mutators(mut self) -> Self {
        self.spawn_mutators = false;
        self
    }

    fn transition(state: &mut TrialState, to: CollectorPhase) {
        let from = state.phase();
        assert!(
            state.transition_to(to),
            "invalid collector transition {from:?} -> {to:?}\n{state}"
        );
    }

    /// Advance the in-flight mark, if any. `true` means it yielded.
    fn mark_step(&mut self, state: &mut TrialState) -> bool {
        let Some(marker) = &mut self.marker else {
            return false;
        };
        match marker.step(state) {
            MarkStep::Yield => true,
            MarkStep::Done => {
                self.marker = None;
                false
            }
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.max_rescans.is_some_and(|max| self.rescans >= max)
    }
}

impl<P: BarrierPolicy> Task for Collector<P> {
    fn name(&self) -> String {
        "collector".to_owned()
    }

    fn is_runnable(&self, state: &TrialState) -> bool {
        match state.phase() {
            CollectorPhase::Draining => state.world().can_write(),
            _ => true,
        }
    }

    fn step(&mut self, cx: &mut Context<'_>) -> Result<Step, Fault> {
        loop {
            match cx.state.phase() {
                CollectorPhase::Marking => {
                    if self.marker.is_none() {
                        let root = cx.state.memory().global_root();
                        self.marker = Some(Marker::new(root, MarkOrigin::Collector));
                    }
                    if self.mark_step(cx.state) {
                        return Ok(Step::Yield);
                    }
                    if self.spawn_mutators {
                        for thread in 0..cx.state.memory().num_threads() {
                            cx.spawn(Mutator::<P>::new(thread));
                        }
                    }
                    Self::transition(cx.state, CollectorPhase::Rescanning);
                }
                CollectorPhase::Rescanning => {
                    if self.mark_step(cx.state) {
                        return Ok(Step::Yield);
                    }
                    if cx.state.scan_clock() >= cx.state.memory().num_threads() {
                        Self::transition(cx.state, CollectorPhase::Draining);
                        continue;
                    }
                    if self.budget_exhausted() {
                        cx.state.metrics_mut().rescan_budget_exhausted = true;
                        #[cfg(feature = "tracing")]
                        crate::tracing::internal::log_rescan_budget_exhausted(
                            self.rescans,
                            cx.state.scan_clock(),
                        );
                        Self::transition(cx.state, CollectorPhase::Draining);
                        continue;
                    }
                    let clock = cx.state.advance_scan_clock();
                    self.rescans += 1;
                    let thread = clock - 1;
                    #[cfg(feature = "tracing")]
                    crate::tracing::internal::log_rescan(thread, clock);
                    let stack = cx.state.memory().stack_slot(thread);
                    let target = cx.state.memory().left(stack);
                    self.marker = Some(Marker::new(target, MarkOrigin::Collector));
                }
                CollectorPhase::Draining => {
                    if !cx.state.world_mut().try_write() {
                        return Ok(Step::Blocked);
                    }
                    Self::transition(cx.state, CollectorPhase::Checking);
                }
                CollectorPhase::Checking => {
                    let readers = cx.state.world().readers();
                    cx.state.metrics_mut().shared_holders_at_check = readers;
                    check_roots(cx.state.memory(), cx.state.marks())?;
                    Self::transition(cx.state, CollectorPhase::Done);
                }
                CollectorPhase::Done => {
                    cx.state.world_mut().write_unlock();
                    return Ok(Step::Done);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::barrier::{ScanRestart, TransitiveMark};
    use crate::heap::{Memory, Object, Slot};
    use crate::sched::strategy::Replay;
    use crate::trial::Trial;

    #[test]
    fn test_phase_transitions() {
        use CollectorPhase::*;
        let order = [Marking, Rescanning, Draining, Checking, Done];
        for from in order {
            for to in order {
                let expected = order
                    .iter()
                    .position(|&p| p == from)
                    .is_some_and(|i| order.get(i + 1) == Some(&to));
                assert_eq!(from.can_transition_to(to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_all_zero_choices_mark_only_root() {
        let config = TrialConfig::default();
        let memory = Memory::new(&config).unwrap();
        let mut chooser = Replay::default();
        let mut trial = Trial::<TransitiveMark>::with_collector(
            memory,
            Collector::new(&config).without_mutators(),
            &mut chooser,
        );

        while trial.state().phase() == CollectorPhase::Marking {
            trial.step().unwrap();
        }
        let root = trial.state().memory().global_root();
        assert_eq!(trial.state().marks().iter_marked().collect::<Vec<_>>(), vec![root]);

        let report = trial.run().unwrap();
        assert_eq!(report.metrics.objects_marked(), 1);
        assert_eq!(report.metrics.rescans, 2);
        assert_eq!(report.metrics.shared_holders_at_check, 0);
        assert_eq!(trial.state().phase(), CollectorPhase::Done);
        assert!(!trial.state().world().is_exclusive());
    }

    /// stack0 -> A(4); H(5) unreachable from any root.
    fn scenario_memory(config: &TrialConfig) -> Memory {
        Memory::from_objects(
            config,
            vec![
                Object::default(),
                Object::new(Slot(4), Slot::NULL),
                Object::default(),
                Object::default(),
                Object::default(),
                Object::default(),
            ],
        )
        .unwrap()
    }

    /// Run until the first rescan yields, then point stack 0 at H and run
    /// the scan-restart check by hand, as a bypassed barrier would.
    fn run_scan_restart_scenario(config: &TrialConfig) -> (Result<(), Fault>, TrialState) {
        let mut chooser = Replay::default();
        let mut trial = Trial::<ScanRestart>::with_collector(
            scenario_memory(config),
            Collector::new(config).without_mutators(),
            &mut chooser,
        );
        while trial.state().scan_clock() == 0 {
            trial.step().unwrap();
        }
        assert!(trial.state().is_marked(Slot(4)));

        let state = trial.state_mut();
        state.memory_mut().set_left(Slot(1), Slot(5));
        ScanRestart::before_publish(state, Slot(5));
        assert_eq!(state.scan_clock(), 0);

        let result = trial.run().map(|_| ());
        (result, trial.state().clone())
    }

    #[test]
    fn test_scan_restart_rescans_until_marked() {
        let (result, state) = run_scan_restart_scenario(&TrialConfig::default());
        assert_eq!(result, Ok(()));
        assert!(state.is_marked(Slot(5)));
        assert_eq!(state.metrics().rescans, 3);
        assert_eq!(state.metrics().scan_restarts, 1);
        assert!(!state.metrics().rescan_budget_exhausted);
    }

    #[test]
    fn test_exhausted_rescan_budget_misses_object() {
        let (result, state) = run_scan_restart_scenario(&TrialConfig::default().max_rescans(1));
        assert_eq!(
            result,
            Err(Fault::MissedObject {
                slot: Slot(5),
                root: Slot(1)
            })
        );
        assert_eq!(state.phase(), CollectorPhase::Checking);
        assert!(state.metrics().rescan_budget_exhausted);
        assert!(!state.is_marked(Slot(5)));
    }

    #[test]
    fn test_draining_waits_for_shared_holders() {
        let config = TrialConfig::default();
        let mut chooser = Replay::default();
        let mut trial = Trial::<TransitiveMark>::with_collector(
            Memory::new(&config).unwrap(),
            Collector::new(&config).without_mutators(),
            &mut chooser,
        );
        // Stand in for a barrier that is still marking.
        assert!(trial.state_mut().world_mut().try_read());
        while trial.state().phase() != CollectorPhase::Draining {
            trial.step().unwrap();
        }
        let collector = Collector::<TransitiveMark>::new(&config);
        assert!(!collector.is_runnable(trial.state()));
        assert!(!trial.state().world().is_exclusive());

        trial.state_mut().world_mut().read_unlock();
        assert!(collector.is_runnable(trial.state()));
        let report = trial.run().unwrap();
        assert_eq!(report.metrics.shared_holders_at_check, 0);
    }
}

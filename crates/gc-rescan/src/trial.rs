//! A single trial: one memory graph, one collector cycle, one check.
//!
//! Everything a trial mutates lives in [`TrialState`], created fresh for
//! every run and handed explicitly to every thread. Nothing survives from
//! one trial to the next except what the chooser itself remembers.

use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

use crate::config::TrialConfig;
use crate::error::{ConfigError, Fault};
use crate::gc::barrier::BarrierPolicy;
use crate::gc::collector::{Collector, CollectorPhase};
use crate::gc::mark::MarkBitmap;
use crate::gc::marker::MarkOrigin;
use crate::gc::sync::StwLock;
use crate::heap::{Memory, Slot};
use crate::metrics::TrialMetrics;
use crate::sched::{Chooser, Scheduler};
use crate::tracing::internal::{next_trial_id, TrialId};

/// Shared state of one trial.
#[derive(Debug, Clone)]
pub struct TrialState {
    memory: Memory,
    marks: MarkBitmap,
    scan_clock: usize,
    world: StwLock,
    phase: CollectorPhase,
    metrics: TrialMetrics,
}

impl TrialState {
    /// Fresh state over `memory`: nothing marked, scan clock at zero, lock
    /// free, collector about to mark.
    #[must_use]
    pub fn new(memory: Memory) -> Self {
        let marks = MarkBitmap::new(memory.len());
        Self {
            memory,
            marks,
            scan_clock: 0,
            world: StwLock::new(),
            phase: CollectorPhase::Marking,
            metrics: TrialMetrics::new(),
        }
    }

    /// The stacks and heap.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable stacks and heap.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// The mark set.
    #[must_use]
    pub const fn marks(&self) -> &MarkBitmap {
        &self.marks
    }

    /// Whether `slot` is marked.
    #[must_use]
    pub fn is_marked(&self, slot: Slot) -> bool {
        self.marks.is_marked(slot)
    }

    /// Set the mark bit of `slot`. Returns `true` if it was clear.
    pub fn mark(&mut self, slot: Slot, origin: MarkOrigin) -> bool {
        if slot.index() >= self.marks.capacity() {
            panic!("mark of out-of-range slot {slot}\n{self}");
        }
        if !self.marks.mark(slot) {
            return false;
        }
        match origin {
            MarkOrigin::Collector => self.metrics.collector_marks += 1,
            MarkOrigin::Barrier => self.metrics.barrier_marks += 1,
        }
        true
    }

    /// Number of rescans started since the last restart.
    #[must_use]
    pub const fn scan_clock(&self) -> usize {
        self.scan_clock
    }

    /// Start the next rescan. Returns the new clock value; the stack being
    /// scanned belongs to thread `clock - 1`.
    pub fn advance_scan_clock(&mut self) -> usize {
        self.scan_clock += 1;
        self.metrics.rescans += 1;
        self.scan_clock
    }

    /// Force every stack to be rescanned because `value` became heap
    /// visible while unmarked.
    pub fn restart_scan(&mut self, value: Slot) {
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_scan_restart(value, self.scan_clock);
        #[cfg(not(feature = "tracing"))]
        let _ = value;

        self.scan_clock = 0;
        self.metrics.scan_restarts += 1;
    }

    /// The stop-the-world lock.
    #[must_use]
    pub const fn world(&self) -> &StwLock {
        &self.world
    }

    /// Mutable stop-the-world lock.
    pub fn world_mut(&mut self) -> &mut StwLock {
        &mut self.world
    }

    /// Current collector phase.
    #[must_use]
    pub const fn phase(&self) -> CollectorPhase {
        self.phase
    }

    /// Move the collector to `to`. Returns `false`, leaving the phase
    /// untouched, if the transition is not part of the protocol.
    pub fn transition_to(&mut self, to: CollectorPhase) -> bool {
        if !self.phase.can_transition_to(to) {
            return false;
        }
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_phase_transition(self.phase, to);
        self.phase = to;
        true
    }

    /// Counters gathered so far.
    #[must_use]
    pub const fn metrics(&self) -> &TrialMetrics {
        &self.metrics
    }

    /// Mutable counters.
    pub fn metrics_mut(&mut self) -> &mut TrialMetrics {
        &mut self.metrics
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.memory.dump(Some(&self.marks)))?;
        write!(
            f,
            "phase: {:?}, scan clock: {}, stw readers: {}, stw exclusive: {}",
            self.phase,
            self.scan_clock,
            self.world.readers(),
            self.world.is_exclusive()
        )
    }
}

/// Summary of a passed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialReport {
    /// Identifier the trial was logged under.
    pub trial_id: TrialId,
    /// Counters gathered during the trial.
    pub metrics: TrialMetrics,
}

/// Why [`run_trial`] did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    /// The final check found a missed object.
    #[error(transparent)]
    Fault(#[from] Fault),
    /// The trial could not be set up.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TrialError {
    /// The fault, if the trial ran and failed.
    #[must_use]
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            Self::Config(_) => None,
        }
    }
}

/// One trial under barrier policy `P`.
///
/// The collector starts as the only thread and spawns the mutators once the
/// global root is marked. The trial is over when every thread has finished
/// or the check fails.
pub struct Trial<'c, P> {
    id: TrialId,
    state: TrialState,
    scheduler: Scheduler,
    chooser: &'c mut dyn Chooser,
    _policy: PhantomData<fn() -> P>,
}

impl<'c, P: BarrierPolicy> Trial<'c, P> {
    /// Trial over an ambiguous memory drawn from `chooser`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(config: &TrialConfig, chooser: &'c mut dyn Chooser) -> Result<Self, ConfigError> {
        let memory = Memory::ambiguous(config, &mut *chooser)?;
        Ok(Self::with_collector(memory, Collector::new(config), chooser))
    }

    /// Trial over a fixed memory. Only the interleaving and the mutators'
    /// targets are ambiguous.
    ///
    /// # Errors
    ///
    /// Returns an error if `memory` was not laid out for `config`.
    pub fn with_memory(
        config: &TrialConfig,
        memory: Memory,
        chooser: &'c mut dyn Chooser,
    ) -> Result<Self, ConfigError> {
        memory.check_layout(config)?;
        Ok(Self::with_collector(memory, Collector::new(config), chooser))
    }

    /// Trial driven by an explicitly configured collector.
    pub fn with_collector(
        memory: Memory,
        collector: Collector<P>,
        chooser: &'c mut dyn Chooser,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.spawn(collector);
        Self {
            id: next_trial_id(),
            state: TrialState::new(memory),
            scheduler,
            chooser,
            _policy: PhantomData,
        }
    }

    /// Identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> TrialId {
        self.id
    }

    /// Current trial state.
    #[must_use]
    pub const fn state(&self) -> &TrialState {
        &self.state
    }

    /// Mutable trial state, for driving scenarios by hand between steps.
    pub fn state_mut(&mut self) -> &mut TrialState {
        &mut self.state
    }

    /// Whether every thread has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Let one thread take one step. Returns `false` once every thread has
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns the fault found by the check.
    pub fn step(&mut self) -> Result<bool, Fault> {
        self.scheduler.step(&mut self.state, &mut *self.chooser)
    }

    /// Run every remaining step.
    ///
    /// The state stays available afterwards, so a failed trial can be
    /// inspected.
    ///
    /// # Errors
    ///
    /// Returns the fault found by the check.
    pub fn run(&mut self) -> Result<TrialReport, Fault> {
        #[cfg(feature = "tracing")]
        let _span = crate::tracing::internal::trace_trial(P::NAME, self.id);

        let result = self.scheduler.wait_all(&mut self.state, &mut *self.chooser);
        if let Err(fault) = &result {
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_fault(fault);
            #[cfg(not(feature = "tracing"))]
            let _ = fault;
        }
        result?;
        Ok(TrialReport {
            trial_id: self.id,
            metrics: self.state.metrics,
        })
    }
}

/// Run one trial under barrier policy `P`, drawing every ambiguous choice
/// from `chooser`.
///
/// # Errors
///
/// Returns [`TrialError::Fault`] if the check found a reachable unmarked
/// object and [`TrialError::Config`] if `config` is invalid.
pub fn run_trial<P: BarrierPolicy>(
    config: &TrialConfig,
    chooser: &mut dyn Chooser,
) -> Result<TrialReport, TrialError> {
    let mut trial = Trial::<P>::new(config, chooser)?;
    Ok(trial.run()?)
}

//! Trial tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for trials and the collector protocol.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    use crate::error::Fault;
    use crate::gc::collector::CollectorPhase;
    use crate::heap::Slot;

    /// Stable identifier for a trial.
    ///
    /// Correlates every event of one trial. Monotonically increasing,
    /// starting at 1, shared by all exploration workers of the process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrialId(pub u64);

    static NEXT_TRIAL_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique trial ID.
    pub fn next_trial_id() -> TrialId {
        TrialId(NEXT_TRIAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a span covering one trial.
    pub fn trace_trial(policy: &str, trial_id: TrialId) -> span::EnteredSpan {
        span!(Level::DEBUG, "trial", policy = policy, trial_id = trial_id.0).entered()
    }

    /// Log a collector phase transition.
    pub fn log_phase_transition(from: CollectorPhase, to: CollectorPhase) {
        tracing::debug!(from = ?from, to = ?to, "phase_transition");
    }

    /// Log the start of a stack rescan.
    pub fn log_rescan(thread: usize, scan_clock: usize) {
        tracing::trace!(thread, scan_clock, "rescan");
    }

    /// Log a scan clock reset by the write barrier.
    pub fn log_scan_restart(value: Slot, scan_clock: usize) {
        tracing::debug!(value = value.0, scan_clock, "scan_restart");
    }

    /// Log a write barrier store.
    pub fn log_publication(slot: Slot, value: Slot) {
        tracing::trace!(slot = slot.0, value = value.0, "publication");
    }

    /// Log that the rescan budget ran out before every stack was scanned.
    pub fn log_rescan_budget_exhausted(rescans: usize, scan_clock: usize) {
        tracing::warn!(rescans, scan_clock, "rescan_budget_exhausted");
    }

    /// Log a failed check.
    pub fn log_fault(fault: &Fault) {
        tracing::debug!(slot = fault.slot().0, root = fault.root().0, "missed_object");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrialId(pub u64);

    /// Stub function when tracing is disabled.
    pub const fn next_trial_id() -> TrialId {
        TrialId(0)
    }
}

pub use internal::TrialId;

//! Trial metrics and exploration totals.

use std::ops::AddAssign;

/// Counters gathered during one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialMetrics {
    /// Scheduler steps taken.
    pub steps: usize,
    /// Steps that ended at a yield point.
    pub yields: usize,
    /// Stack rescans started by the collector.
    pub rescans: usize,
    /// Scan clock resets requested by the write barrier.
    pub scan_restarts: usize,
    /// Objects first marked by the collector.
    pub collector_marks: usize,
    /// Objects first marked by a write barrier.
    pub barrier_marks: usize,
    /// Pointer stores performed by write barriers.
    pub publications: usize,
    /// Heap-to-stack loads performed by mutators.
    pub loads: usize,
    /// Shared stw holders observed when the check started.
    pub shared_holders_at_check: usize,
    /// Whether the collector gave up rescanning because of its budget.
    pub rescan_budget_exhausted: bool,
}

impl TrialMetrics {
    /// Create metrics with every counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            steps: 0,
            yields: 0,
            rescans: 0,
            scan_restarts: 0,
            collector_marks: 0,
            barrier_marks: 0,
            publications: 0,
            loads: 0,
            shared_holders_at_check: 0,
            rescan_budget_exhausted: false,
        }
    }

    /// Total objects marked during the trial.
    #[must_use]
    pub const fn objects_marked(&self) -> usize {
        self.collector_marks + self.barrier_marks
    }
}

/// Totals over every trial of an exploration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorationTotals {
    /// Trials run, passed or failed.
    pub trials: u64,
    /// Trials that ended with a fault.
    pub faults: u64,
    /// Scheduler steps over all trials.
    pub steps: u64,
    /// Stack rescans over all trials.
    pub rescans: u64,
    /// Scan clock resets over all trials.
    pub scan_restarts: u64,
    /// Longest trial in steps.
    pub max_steps: usize,
}

impl AddAssign<&TrialMetrics> for ExplorationTotals {
    fn add_assign(&mut self, metrics: &TrialMetrics) {
        self.trials += 1;
        self.steps += metrics.steps as u64;
        self.rescans += metrics.rescans as u64;
        self.scan_restarts += metrics.scan_restarts as u64;
        self.max_steps = self.max_steps.max(metrics.steps);
    }
}

impl AddAssign for ExplorationTotals {
    fn add_assign(&mut self, other: Self) {
        self.trials += other.trials;
        self.faults += other.faults;
        self.steps += other.steps;
        self.rescans += other.rescans;
        self.scan_restarts += other.scan_restarts;
        self.max_steps = self.max_steps.max(other.max_steps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_marked() {
        let metrics = TrialMetrics {
            collector_marks: 3,
            barrier_marks: 2,
            ..TrialMetrics::new()
        };
        assert_eq!(metrics.objects_marked(), 5);
    }

    #[test]
    fn test_totals_accumulate() {
        let mut totals = ExplorationTotals::default();
        totals += &TrialMetrics {
            steps: 10,
            rescans: 2,
            ..TrialMetrics::new()
        };
        totals += &TrialMetrics {
            steps: 4,
            scan_restarts: 1,
            ..TrialMetrics::new()
        };
        assert_eq!(totals.trials, 2);
        assert_eq!(totals.steps, 14);
        assert_eq!(totals.rescans, 2);
        assert_eq!(totals.scan_restarts, 1);
        assert_eq!(totals.max_steps, 10);

        let mut merged = ExplorationTotals::default();
        merged += totals;
        merged += totals;
        assert_eq!(merged.trials, 4);
        assert_eq!(merged.max_steps, 10);
    }
}

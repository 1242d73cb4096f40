//! Trial and exploration configuration.

use crate::error::ConfigError;

/// Default number of mutator threads.
pub const DEFAULT_NUM_THREADS: usize = 2;
/// Default number of memory slots (null + stacks + heap).
pub const DEFAULT_NUM_SLOTS: usize = 6;
/// Default number of trials an exploration runs.
pub const DEFAULT_MAX_TRIALS: u64 = 10_000;

/// Shape of a single trial.
///
/// Slot 0 is null, slots `1..=num_threads` are the per-thread stacks and the
/// remaining slots form the heap. The first heap slot is the global root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialConfig {
    /// Number of mutator threads, one stack slot each.
    pub num_threads: usize,
    /// Total number of memory slots.
    pub num_slots: usize,
    /// Upper bound on stack rescans. `None` rescans until every thread has
    /// been scanned since the last restart.
    pub max_rescans: Option<usize>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            num_slots: DEFAULT_NUM_SLOTS,
            max_rescans: None,
        }
    }
}

impl TrialConfig {
    /// Configuration with `num_threads` stacks and `num_heap` heap objects.
    #[must_use]
    pub const fn with_heap(num_threads: usize, num_heap: usize) -> Self {
        Self {
            num_threads,
            num_slots: num_threads.saturating_add(num_heap).saturating_add(1),
            max_rescans: None,
        }
    }

    /// Set the rescan budget.
    #[must_use]
    pub const fn max_rescans(mut self, max_rescans: usize) -> Self {
        self.max_rescans = Some(max_rescans);
        self
    }

    /// Number of heap slots, including the global root.
    #[must_use]
    pub const fn num_heap(&self) -> usize {
        self.num_slots.saturating_sub(1 + self.num_threads)
    }

    /// Check that the layout leaves room for null, the stacks and the
    /// global root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroThreads`] without mutators,
    /// [`ConfigError::TooManyThreads`] when the stacks alone overflow the
    /// address range and [`ConfigError::TooFewSlots`] when there is no heap
    /// slot.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        let Some(required) = self.num_threads.checked_add(2) else {
            return Err(ConfigError::TooManyThreads {
                num_threads: self.num_threads,
            });
        };
        if self.num_slots < required {
            return Err(ConfigError::TooFewSlots {
                num_slots: self.num_slots,
                required,
            });
        }
        Ok(())
    }
}

/// How an exploration walks the choice space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Independent pseudo-random trials.
    #[default]
    Random,
    /// Exhaustive depth-first enumeration of every choice sequence.
    DepthFirst,
}

/// Settings for [`explore`](crate::explore::explore).
#[derive(Debug, Clone, Copy)]
pub struct ExploreConfig {
    /// Choice-space walk.
    pub strategy: Strategy,
    /// Stop after this many trials. `None` runs a depth-first search to
    /// exhaustion; random exploration always needs a bound.
    pub max_trials: Option<u64>,
    /// Seed for the random strategy. Worker `n` uses `seed + n`.
    pub seed: u64,
    /// Worker threads for the random strategy. Depth-first search is
    /// sequential.
    pub jobs: usize,
    /// Stop at the first fault instead of collecting every faulting trace.
    pub stop_on_fault: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Random,
            max_trials: Some(DEFAULT_MAX_TRIALS),
            seed: 0,
            jobs: 1,
            stop_on_fault: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = TrialConfig::default();
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.num_slots, 6);
        assert_eq!(config.num_heap(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_heap() {
        let config = TrialConfig::with_heap(1, 2);
        assert_eq!(config.num_slots, 4);
        assert_eq!(config.num_heap(), 2);
    }

    #[test]
    fn test_validate_rejects_missing_heap() {
        let config = TrialConfig {
            num_threads: 3,
            num_slots: 4,
            max_rescans: None,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooFewSlots {
                num_slots: 4,
                required: 5
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        assert_eq!(
            TrialConfig::with_heap(0, 3).validate(),
            Err(ConfigError::ZeroThreads)
        );
    }

    #[test]
    fn test_validate_rejects_thread_overflow() {
        let config = TrialConfig {
            num_threads: usize::MAX,
            num_slots: 5,
            max_rescans: None,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyThreads {
                num_threads: usize::MAX
            })
        );
        assert_eq!(
            TrialConfig::with_heap(usize::MAX - 1, 1).validate(),
            Err(ConfigError::TooManyThreads {
                num_threads: usize::MAX - 1
            })
        );
    }
}

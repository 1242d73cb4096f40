//! Running many trials and collecting the faulting ones.
//!
//! Depth-first exploration walks every choice sequence in order on the
//! calling thread. Random exploration samples sequences, optionally on
//! several worker threads that share one trial counter. Each faulting trial
//! is kept as a [`FaultRecord`] whose trace replays it through [`replay`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::{ExploreConfig, Strategy, TrialConfig};
use crate::error::{ConfigError, Fault};
use crate::gc::barrier::BarrierPolicy;
use crate::heap::Memory;
use crate::metrics::{ExplorationTotals, TrialMetrics};
use crate::sched::strategy::{DepthFirst, RandomChooser, Recorder, Replay};
use crate::sched::Chooser;
use crate::tracing::TrialId;
use crate::trial::{Trial, TrialError, TrialReport};

/// A faulting trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    /// What the check found.
    pub fault: Fault,
    /// Every choice the trial made, for [`replay`].
    pub trace: Vec<usize>,
    /// Memory, marks and collector state when the check failed.
    pub state: String,
    /// Identifier the trial was logged under.
    pub trial_id: TrialId,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.fault)?;
        writeln!(f, "trace: {:?}", self.trace)?;
        write!(f, "{}", self.state)
    }
}

/// Result of an exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationReport {
    /// Barrier policy explored.
    pub policy: &'static str,
    /// Counters over every trial run.
    pub totals: ExplorationTotals,
    /// Faulting trials, in the order they were found.
    pub faults: Vec<FaultRecord>,
    /// Whether a depth-first search covered the whole choice space.
    pub exhausted: bool,
}

impl ExplorationReport {
    fn new(policy: &'static str) -> Self {
        Self {
            policy,
            totals: ExplorationTotals::default(),
            faults: Vec::new(),
            exhausted: false,
        }
    }

    /// Whether no trial faulted.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.faults.is_empty()
    }
}

impl fmt::Display for ExplorationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} trials, {} faults, {} steps (max {} per trial), {} rescans, {} scan restarts",
            self.policy,
            self.totals.trials,
            self.totals.faults,
            self.totals.steps,
            self.totals.max_steps,
            self.totals.rescans,
            self.totals.scan_restarts,
        )?;
        if self.exhausted {
            f.write_str(", search exhausted")?;
        }
        Ok(())
    }
}

struct Outcome {
    metrics: TrialMetrics,
    fault: Option<(Fault, String, TrialId)>,
}

fn run_one<P: BarrierPolicy>(
    config: &TrialConfig,
    memory: Option<&Memory>,
    chooser: &mut dyn Chooser,
) -> Result<Outcome, ConfigError> {
    let mut trial = match memory {
        Some(memory) => Trial::<P>::with_memory(config, memory.clone(), chooser)?,
        None => Trial::<P>::new(config, chooser)?,
    };
    Ok(match trial.run() {
        Ok(report) => Outcome {
            metrics: report.metrics,
            fault: None,
        },
        Err(fault) => Outcome {
            metrics: *trial.state().metrics(),
            fault: Some((fault, trial.state().to_string(), trial.id())),
        },
    })
}

/// Explore trials under barrier policy `P` with ambiguous memory.
///
/// # Errors
///
/// Returns an error if `trial` is invalid, or if a random exploration has no
/// trial bound.
///
/// # Panics
///
/// Re-raises a panic from any worker thread.
pub fn explore<P: BarrierPolicy>(
    trial: &TrialConfig,
    config: &ExploreConfig,
) -> Result<ExplorationReport, ConfigError> {
    explore_inner::<P>(trial, None, config)
}

/// Explore interleavings and mutator targets over a fixed memory.
///
/// # Errors
///
/// Returns an error if `memory` does not match `trial`, or if a random
/// exploration has no trial bound.
///
/// # Panics
///
/// Re-raises a panic from any worker thread.
pub fn explore_memory<P: BarrierPolicy>(
    trial: &TrialConfig,
    memory: &Memory,
    config: &ExploreConfig,
) -> Result<ExplorationReport, ConfigError> {
    memory.check_layout(trial)?;
    explore_inner::<P>(trial, Some(memory), config)
}

fn explore_inner<P: BarrierPolicy>(
    trial: &TrialConfig,
    memory: Option<&Memory>,
    config: &ExploreConfig,
) -> Result<ExplorationReport, ConfigError> {
    trial.validate()?;
    match config.strategy {
        Strategy::DepthFirst => depth_first::<P>(trial, memory, config),
        Strategy::Random => {
            let max_trials = config.max_trials.ok_or(ConfigError::UnboundedRandom)?;
            random::<P>(trial, memory, config, max_trials)
        }
    }
}

fn depth_first<P: BarrierPolicy>(
    trial: &TrialConfig,
    memory: Option<&Memory>,
    config: &ExploreConfig,
) -> Result<ExplorationReport, ConfigError> {
    let mut report = ExplorationReport::new(P::NAME);
    let mut dfs = DepthFirst::new();
    loop {
        if config
            .max_trials
            .is_some_and(|max| report.totals.trials >= max)
        {
            break;
        }
        let outcome = run_one::<P>(trial, memory, &mut dfs)?;
        report.totals += &outcome.metrics;
        if let Some((fault, state, trial_id)) = outcome.fault {
            report.totals.faults += 1;
            report.faults.push(FaultRecord {
                fault,
                trace: dfs.trace(),
                state,
                trial_id,
            });
            if config.stop_on_fault {
                break;
            }
        }
        if !dfs.next_trial() {
            report.exhausted = true;
            break;
        }
    }
    Ok(report)
}

fn random<P: BarrierPolicy>(
    trial: &TrialConfig,
    memory: Option<&Memory>,
    config: &ExploreConfig,
    max_trials: u64,
) -> Result<ExplorationReport, ConfigError> {
    let next = AtomicU64::new(0);
    let stop = AtomicBool::new(false);
    let shared = Mutex::new(ExplorationReport::new(P::NAME));

    let worker = |index: u64| -> Result<(), ConfigError> {
        let mut recorder = Recorder::new(RandomChooser::new(config.seed.wrapping_add(index)));
        let mut totals = ExplorationTotals::default();
        while !stop.load(Ordering::Relaxed) && next.fetch_add(1, Ordering::Relaxed) < max_trials {
            recorder.clear();
            let outcome = run_one::<P>(trial, memory, &mut recorder)?;
            totals += &outcome.metrics;
            if let Some((fault, state, trial_id)) = outcome.fault {
                totals.faults += 1;
                shared.lock().faults.push(FaultRecord {
                    fault,
                    trace: recorder.trace(),
                    state,
                    trial_id,
                });
                if config.stop_on_fault {
                    stop.store(true, Ordering::Relaxed);
                }
            }
        }
        shared.lock().totals += totals;
        Ok(())
    };

    let jobs = config.jobs.max(1);
    if jobs == 1 {
        worker(0)?;
    } else {
        let results = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..jobs as u64)
                .map(|index| {
                    let worker = &worker;
                    scope.spawn(move |_| worker(index))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
        for result in results {
            result.unwrap_or_else(|payload| std::panic::resume_unwind(payload))?;
        }
    }
    Ok(shared.into_inner())
}

/// Re-run the trial a [`FaultRecord::trace`] describes.
///
/// # Errors
///
/// Returns the fault the replayed trial hits, or a configuration error.
///
/// # Panics
///
/// Panics if the trace does not fit the trial, which means it was recorded
/// under another configuration.
pub fn replay<P: BarrierPolicy>(
    config: &TrialConfig,
    memory: Option<&Memory>,
    trace: &[usize],
) -> Result<TrialReport, TrialError> {
    let mut chooser = Replay::new(trace.to_vec());
    let mut trial = match memory {
        Some(memory) => Trial::<P>::with_memory(config, memory.clone(), &mut chooser)?,
        None => Trial::<P>::new(config, &mut chooser)?,
    };
    Ok(trial.run()?)
}

//! Interleaving explorer for concurrent GC stack-rescan write barriers.
//!
//! `gc-rescan` models a tiny heap, a collector that marks from a global root
//! and then rescans every thread stack, and mutator threads that move
//! pointers between their stacks and the heap while the collector runs.
//! Every source of nondeterminism, from the initial heap shape to the order
//! in which threads take their steps, is an ambiguous choice answered by a
//! [`Chooser`]. Enumerating or sampling those answers explores every way the
//! cycle can play out, and each trial ends by checking that everything
//! reachable was marked.
//!
//! # Features
//!
//! - **Three barriers**: [`TransitiveMark`], [`ScanRestart`] and
//!   [`Unbarriered`], selected by type parameter
//! - **Exhaustive or random exploration**: depth-first enumeration of every
//!   choice sequence, or seeded sampling across worker threads
//! - **Replayable faults**: every faulting trial carries the choice trace
//!   that reproduces it
//!
//! # Quick Start
//!
//! ```
//! use gc_rescan::{explore, ExploreConfig, TransitiveMark, TrialConfig};
//!
//! let trial = TrialConfig::default();
//! let config = ExploreConfig {
//!     max_trials: Some(500),
//!     ..ExploreConfig::default()
//! };
//!
//! let report = explore::<TransitiveMark>(&trial, &config).unwrap();
//! assert!(report.passed());
//! ```
//!
//! # Replaying a fault
//!
//! ```
//! use gc_rescan::{replay, Fault, Memory, Object, Slot, TrialConfig, Unbarriered};
//!
//! let config = TrialConfig::default();
//! // Stack 0 holds 4, stack 1 holds 5, the heap is empty.
//! let memory = Memory::from_objects(
//!     &config,
//!     vec![
//!         Object::default(),
//!         Object::new(Slot(4), Slot::NULL),
//!         Object::new(Slot(5), Slot::NULL),
//!         Object::default(),
//!         Object::default(),
//!         Object::default(),
//!     ],
//! )
//! .unwrap();
//!
//! let err = replay::<Unbarriered>(&config, Some(&memory), &[2, 2, 1]).unwrap_err();
//! assert_eq!(
//!     err.fault(),
//!     Some(Fault::MissedObject { slot: Slot(5), root: Slot(3) })
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod explore;
pub mod gc;
pub mod heap;
pub mod metrics;
pub mod mutator;
pub mod sched;
pub mod trial;

/// Structured logging of trials.
///
/// Event helpers are only available with the `tracing` feature.
pub mod tracing;

// Re-export public API
pub use config::{ExploreConfig, Strategy, TrialConfig};
pub use error::{ConfigError, Fault};
pub use explore::{explore, explore_memory, replay, ExplorationReport, FaultRecord};
pub use gc::{
    BarrierAction, BarrierPolicy, Collector, CollectorPhase, ScanRestart, TransitiveMark,
    Unbarriered,
};
pub use heap::{Memory, Object, Slot};
pub use metrics::{ExplorationTotals, TrialMetrics};
pub use sched::strategy::{DepthFirst, RandomChooser, Recorder, Replay};
pub use sched::{Chooser, Step, Task};
pub use trial::{run_trial, Trial, TrialError, TrialReport, TrialState};

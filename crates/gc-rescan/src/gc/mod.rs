//! The collector side of a trial.
//!
//! This module provides the pieces one collector cycle is built from:
//! - Transitive marking with explicit yield points
//! - Write barrier policies run by the mutators
//! - The stop-the-world lock that lets barriers finish before the check
//! - The collector thread and the final mark completeness check

pub mod barrier;
pub mod checker;
pub mod collector;
pub mod mark;
pub mod marker;
pub mod sync;

// Re-exports from barrier
pub use barrier::{
    BarrierAction, BarrierPolicy, ScanRestart, TransitiveMark, Unbarriered, WriteBarrier,
};

// Re-exports from collector
pub use collector::{Collector, CollectorPhase};

// Re-exports from marker
pub use marker::{MarkOrigin, MarkStep, Marker};

pub use mark::MarkBitmap;
pub use sync::StwLock;

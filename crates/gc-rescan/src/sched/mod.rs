//! Cooperative scheduling of logical threads.
//!
//! A trial runs the collector and the mutators as explicit state machines on
//! a single logical core. Each call to [`Task::step`] runs a thread up to its
//! next suspension point and is atomic with respect to every other thread.
//! Which runnable thread steps next is itself an ambiguous choice, so a
//! single [`Chooser`] drives both the heap shape and the interleaving.
//!
//! The exploration contract maps onto this module as follows:
//!
//! | Operation           | Here                                   |
//! |---------------------|----------------------------------------|
//! | `spawn(body)`       | [`Context::spawn`], [`Scheduler::spawn`] |
//! | `yield()`           | returning [`Step::Yield`]              |
//! | `chooseAmbiguous(n)`| [`Chooser::choose`] through [`choose`] |
//! | `waitAll()`         | [`Scheduler::wait_all`]                |

pub mod strategy;

use crate::error::Fault;
use crate::heap::Slot;
use crate::trial::TrialState;

/// Source of ambiguous choices.
///
/// Exploration engines implement this to enumerate or sample the choice
/// space. Implementations must return a value in `0..n`.
pub trait Chooser {
    /// Pick one of `n` alternatives, `n >= 2`.
    fn choose(&mut self, n: usize) -> usize;
}

impl<C: Chooser + ?Sized> Chooser for &mut C {
    fn choose(&mut self, n: usize) -> usize {
        (**self).choose(n)
    }
}

/// Resolve an ambiguous choice among `n` alternatives.
///
/// A single alternative is answered without consulting `chooser`, so traces
/// only contain real decisions.
///
/// # Panics
///
/// Panics if `n` is zero or the chooser answers outside `0..n`.
pub fn choose<C: Chooser + ?Sized>(chooser: &mut C, n: usize) -> usize {
    assert!(n > 0, "ambiguous choice among zero alternatives");
    if n == 1 {
        return 0;
    }
    let choice = chooser.choose(n);
    assert!(choice < n, "chooser answered {choice} for {n} alternatives");
    choice
}

/// Result of running a thread up to its next suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Reached a yield point; any runnable thread may go next.
    Yield,
    /// Stopped in front of a lock it cannot take. The thread is not
    /// scheduled again until [`Task::is_runnable`] reports true.
    Blocked,
    /// Finished its body.
    Done,
}

/// A logical thread.
pub trait Task {
    /// Short name used in logs.
    fn name(&self) -> String;

    /// Whether the thread can make progress in the current state.
    fn is_runnable(&self, _state: &TrialState) -> bool {
        true
    }

    /// Run until the next suspension point.
    ///
    /// # Errors
    ///
    /// Returns the fault that ends the trial.
    fn step(&mut self, cx: &mut Context<'_>) -> Result<Step, Fault>;
}

/// What a running thread can reach: the trial state, the chooser and the
/// ability to start new threads.
pub struct Context<'a> {
    /// Shared trial state.
    pub state: &'a mut TrialState,
    chooser: &'a mut dyn Chooser,
    spawned: &'a mut Vec<Box<dyn Task>>,
}

impl Context<'_> {
    /// Resolve an ambiguous choice among `n` alternatives.
    pub fn choose(&mut self, n: usize) -> usize {
        choose(&mut *self.chooser, n)
    }

    /// Ambiguously pick a heap object reachable from the global root.
    pub fn ambiguous_reachable_heap_pointer(&mut self) -> Slot {
        self.state
            .memory()
            .ambiguous_reachable_heap_pointer(&mut *self.chooser)
    }

    /// Start a new logical thread. It becomes runnable once the current
    /// step finishes.
    pub fn spawn<T: Task + 'static>(&mut self, task: T) {
        self.spawned.push(Box::new(task));
    }
}

/// Runs logical threads one step at a time, letting the chooser pick the
/// order.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Box<dyn Task>>,
}

impl Scheduler {
    /// Scheduler with no threads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thread.
    pub fn spawn<T: Task + 'static>(&mut self, task: T) {
        self.tasks.push(Box::new(task));
    }

    /// Number of unfinished threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether every thread has finished.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Step one runnable thread. Returns `false` once every thread has
    /// finished.
    ///
    /// # Errors
    ///
    /// Propagates the fault raised by the stepped thread.
    ///
    /// # Panics
    ///
    /// Panics if threads remain but none can run.
    pub fn step(
        &mut self,
        state: &mut TrialState,
        chooser: &mut dyn Chooser,
    ) -> Result<bool, Fault> {
        if self.tasks.is_empty() {
            return Ok(false);
        }
        let runnable: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_runnable(state))
            .map(|(index, _)| index)
            .collect();
        if runnable.is_empty() {
            let names: Vec<String> = self.tasks.iter().map(|task| task.name()).collect();
            panic!("deadlock: no runnable thread among {names:?}\n{state}");
        }
        let index = runnable[choose(&mut *chooser, runnable.len())];

        let mut spawned = Vec::new();
        let step = {
            let mut cx = Context {
                state: &mut *state,
                chooser: &mut *chooser,
                spawned: &mut spawned,
            };
            self.tasks[index].step(&mut cx)?
        };
        state.metrics_mut().steps += 1;
        match step {
            Step::Yield => state.metrics_mut().yields += 1,
            Step::Blocked => {}
            Step::Done => {
                self.tasks.remove(index);
            }
        }
        self.tasks.append(&mut spawned);
        Ok(true)
    }

    /// Step threads until all of them have finished.
    ///
    /// # Errors
    ///
    /// Stops at the first fault.
    pub fn wait_all(
        &mut self,
        state: &mut TrialState,
        chooser: &mut dyn Chooser,
    ) -> Result<(), Fault> {
        while self.step(state, chooser)? {}
        Ok(())
    }
}

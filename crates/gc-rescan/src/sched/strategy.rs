//! Choice strategies: random sampling, exhaustive depth-first enumeration
//! and trace replay.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Chooser;

/// One resolved ambiguous choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Alternative taken.
    pub taken: usize,
    /// Number of alternatives offered.
    pub width: usize,
}

/// Uniformly random choices from a seeded generator.
#[derive(Debug, Clone)]
pub struct RandomChooser {
    rng: StdRng,
}

impl RandomChooser {
    /// Chooser seeded with `seed`; equal seeds give equal sequences.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Chooser for RandomChooser {
    fn choose(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}

/// Exhaustive depth-first enumeration of choice sequences.
///
/// Each trial replays the current decision prefix and takes alternative 0
/// for every decision past it. [`DepthFirst::next_trial`] then advances the
/// deepest decision that still has untried alternatives, dropping everything
/// below it. The search is complete once every decision is exhausted.
///
/// Trials must be deterministic given their choices: a replayed decision
/// offered with a different width means the trial diverged.
#[derive(Debug, Clone, Default)]
pub struct DepthFirst {
    path: Vec<Decision>,
    pos: usize,
}

impl DepthFirst {
    /// Search starting at the all-zero sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choices taken so far in the current trial.
    #[must_use]
    pub fn trace(&self) -> Vec<usize> {
        self.path[..self.pos].iter().map(|d| d.taken).collect()
    }

    /// Decisions of the current trial.
    #[must_use]
    pub fn decisions(&self) -> &[Decision] {
        &self.path[..self.pos]
    }

    /// Move to the next unexplored sequence. Returns `false` when the
    /// search is complete.
    pub fn next_trial(&mut self) -> bool {
        // A trial that ended early (at a fault) never reached the tail.
        self.path.truncate(self.pos);
        self.pos = 0;
        while let Some(last) = self.path.last_mut() {
            if last.taken + 1 < last.width {
                last.taken += 1;
                return true;
            }
            self.path.pop();
        }
        false
    }
}

impl Chooser for DepthFirst {
    fn choose(&mut self, n: usize) -> usize {
        let taken = if let Some(decision) = self.path.get(self.pos) {
            assert_eq!(
                decision.width, n,
                "trial diverged from its replayed prefix at decision {}",
                self.pos
            );
            decision.taken
        } else {
            self.path.push(Decision { taken: 0, width: n });
            0
        };
        self.pos += 1;
        taken
    }
}

/// Replays a fixed choice sequence, then answers 0 forever.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    script: Vec<usize>,
    pos: usize,
}

impl Replay {
    /// Replay `script`.
    #[must_use]
    pub const fn new(script: Vec<usize>) -> Self {
        Self { script, pos: 0 }
    }

    /// Number of choices answered so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.pos
    }
}

impl Chooser for Replay {
    fn choose(&mut self, n: usize) -> usize {
        let taken = self.script.get(self.pos).copied().unwrap_or(0);
        assert!(
            taken < n,
            "replayed choice {taken} at position {} is out of range for {n} alternatives",
            self.pos
        );
        self.pos += 1;
        taken
    }
}

/// Wraps a chooser and records every decision it makes.
#[derive(Debug, Clone)]
pub struct Recorder<C> {
    inner: C,
    decisions: Vec<Decision>,
}

impl<C: Chooser> Recorder<C> {
    /// Record the decisions of `inner`.
    #[must_use]
    pub const fn new(inner: C) -> Self {
        Self {
            inner,
            decisions: Vec::new(),
        }
    }

    /// Decisions recorded so far.
    #[must_use]
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// Alternatives taken so far, suitable for [`Replay::new`].
    #[must_use]
    pub fn trace(&self) -> Vec<usize> {
        self.decisions.iter().map(|d| d.taken).collect()
    }

    /// Forget the recorded decisions, keeping the inner chooser's state.
    pub fn clear(&mut self) {
        self.decisions.clear();
    }

    /// The wrapped chooser.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Chooser> Chooser for Recorder<C> {
    fn choose(&mut self, n: usize) -> usize {
        let taken = self.inner.choose(n);
        self.decisions.push(Decision { taken, width: n });
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Enumerate every sequence of a fixed two-decision tree.
    #[test]
    fn test_depth_first_enumerates_all_sequences() {
        let mut dfs = DepthFirst::new();
        let mut seen = Vec::new();
        loop {
            let a = dfs.choose(2);
            let b = dfs.choose(3);
            seen.push((a, b));
            if !dfs.next_trial() {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    /// The width of later decisions may depend on earlier ones.
    #[test]
    fn test_depth_first_dependent_widths() {
        let mut dfs = DepthFirst::new();
        let mut count = 0;
        loop {
            let a = dfs.choose(3);
            for _ in 0..a {
                dfs.choose(2);
            }
            count += 1;
            if !dfs.next_trial() {
                break;
            }
        }
        // a = 0: 1 sequence, a = 1: 2 sequences, a = 2: 4 sequences.
        assert_eq!(count, 7);
    }

    #[test]
    fn test_depth_first_trace() {
        let mut dfs = DepthFirst::new();
        dfs.choose(2);
        dfs.choose(2);
        assert!(dfs.next_trial());
        dfs.choose(2);
        dfs.choose(2);
        assert_eq!(dfs.trace(), vec![0, 1]);
        assert_eq!(
            dfs.decisions(),
            [
                Decision { taken: 0, width: 2 },
                Decision { taken: 1, width: 2 },
            ]
        );
    }

    #[test]
    #[should_panic(expected = "diverged")]
    fn test_depth_first_detects_divergence() {
        let mut dfs = DepthFirst::new();
        dfs.choose(2);
        dfs.choose(2);
        dfs.next_trial();
        dfs.choose(3);
    }

    #[test]
    fn test_random_chooser_is_seeded() {
        let mut a = RandomChooser::new(7);
        let mut b = RandomChooser::new(7);
        for n in 2..50 {
            let x = a.choose(n);
            assert!(x < n);
            assert_eq!(x, b.choose(n));
        }
    }

    #[test]
    fn test_recorder_trace_replays() {
        let mut recorder = Recorder::new(RandomChooser::new(3));
        let original: Vec<usize> = (2..10).map(|n| recorder.choose(n)).collect();

        let mut replay = Replay::new(recorder.trace());
        let replayed: Vec<usize> = (2..10).map(|n| replay.choose(n)).collect();
        assert_eq!(original, replayed);
        assert_eq!(replay.consumed(), 8);
    }

    #[test]
    fn test_recorder_keeps_inner_state() {
        let mut recorder = Recorder::new(Replay::new(vec![2, 1]));
        assert_eq!(recorder.choose(3), 2);
        assert_eq!(recorder.choose(2), 1);
        recorder.clear();
        assert!(recorder.decisions().is_empty());
        assert_eq!(recorder.into_inner().consumed(), 2);
    }

    #[test]
    fn test_replay_pads_with_zero() {
        let mut replay = Replay::new(vec![1]);
        assert_eq!(replay.choose(2), 1);
        assert_eq!(replay.choose(2), 0);
        assert_eq!(replay.choose(5), 0);
    }
}

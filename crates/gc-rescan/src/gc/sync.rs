//! # Stop-the-World Lock
//!
//! A single shared/exclusive lock per trial coordinating in-flight write
//! barriers against collector termination.
//!
//! | Holder          | Mode      | Held across                                |
//! |-----------------|-----------|--------------------------------------------|
//! | Write barrier   | shared    | the transitive mark of the published value |
//! | Collector       | exclusive | the final invariant check                  |
//!
//! Threads are cooperative, so acquisition never spins: a thread that cannot
//! take the lock returns [`Step::Blocked`](crate::sched::Step::Blocked) and
//! reports itself unrunnable until [`StwLock::can_read`] or
//! [`StwLock::can_write`] flips.
//!
//! ## Rules
//!
//! 1. Any number of shared holders may coexist.
//! 2. Exclusive mode is granted only when there is no holder at all.
//! 3. Shared mode is refused while the exclusive holder exists.
//!
//! Releasing a mode that is not held is a bug in the caller and panics.

/// Shared/exclusive lock state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StwLock {
    readers: usize,
    writer: bool,
}

impl StwLock {
    /// An unheld lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            readers: 0,
            writer: false,
        }
    }

    /// Number of shared holders.
    #[must_use]
    pub const fn readers(&self) -> usize {
        self.readers
    }

    /// Whether the exclusive mode is held.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.writer
    }

    /// Whether [`StwLock::try_read`] would succeed.
    #[must_use]
    pub const fn can_read(&self) -> bool {
        !self.writer
    }

    /// Whether [`StwLock::try_write`] would succeed.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        !self.writer && self.readers == 0
    }

    /// Take the shared mode if no exclusive holder exists.
    pub fn try_read(&mut self) -> bool {
        if !self.can_read() {
            return false;
        }
        self.readers += 1;
        true
    }

    /// Release one shared hold.
    ///
    /// # Panics
    ///
    /// Panics if the shared mode is not held.
    pub fn read_unlock(&mut self) {
        assert!(self.readers > 0, "shared unlock of an unheld stw lock");
        self.readers -= 1;
    }

    /// Take the exclusive mode if the lock is free.
    pub fn try_write(&mut self) -> bool {
        if !self.can_write() {
            return false;
        }
        self.writer = true;
        true
    }

    /// Release the exclusive mode.
    ///
    /// # Panics
    ///
    /// Panics if the exclusive mode is not held.
    pub fn write_unlock(&mut self) {
        assert!(self.writer, "exclusive unlock of an unheld stw lock");
        self.writer = false;
    }
}

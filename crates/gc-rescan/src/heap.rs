//! Slot-indexed memory holding the stacks and the heap.
//!
//! Memory is a fixed array of two-field objects:
//!
//! | Slots                       | Region                          |
//! |-----------------------------|---------------------------------|
//! | `0`                         | null, never dereferenced        |
//! | `1..=num_threads`           | one stack per thread, `left` only |
//! | `num_threads + 1`           | the global root (first heap slot) |
//! | `num_threads + 2..len`      | remaining heap objects          |
//!
//! Heap objects only ever point to null or to other heap objects. Stack
//! slots are never the target of a pointer.

use std::fmt;

use crate::config::TrialConfig;
use crate::error::ConfigError;
use crate::gc::mark::MarkBitmap;
use crate::sched::{choose, Chooser};

/// Index of a memory slot. `Slot(0)` is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub usize);

impl Slot {
    /// The null pointer.
    pub const NULL: Self = Self(0);

    /// Whether this is the null pointer.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw index into memory.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A memory object with two pointer fields.
///
/// Stack slots use `left` as the thread's single live variable and leave
/// `right` null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Object {
    /// First pointer field; the only one mutators store to.
    pub left: Slot,
    /// Second pointer field, fixed once the memory is built.
    pub right: Slot,
}

impl Object {
    /// Object with the given fields.
    #[must_use]
    pub const fn new(left: Slot, right: Slot) -> Self {
        Self { left, right }
    }
}

/// The stacks and heap of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    objects: Vec<Object>,
    num_threads: usize,
}

impl Memory {
    /// All-null memory laid out for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` has no room for a heap.
    pub fn new(config: &TrialConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            objects: vec![Object::default(); config.num_slots],
            num_threads: config.num_threads,
        })
    }

    /// Memory whose pointer fields are all ambiguous choices.
    ///
    /// Every slot's `left` field is chosen in slot order, and for heap slots
    /// the `right` field right after it. The resulting graph may contain
    /// cycles and unreachable objects.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` has no room for a heap.
    pub fn ambiguous<C: Chooser + ?Sized>(
        config: &TrialConfig,
        chooser: &mut C,
    ) -> Result<Self, ConfigError> {
        let mut memory = Self::new(config)?;
        for index in 1..memory.len() {
            let slot = Slot(index);
            let left = memory.ambiguous_heap_pointer(chooser);
            memory.set_left(slot, left);
            if memory.is_heap(slot) {
                let right = memory.ambiguous_heap_pointer(chooser);
                memory.set_right(slot, right);
            }
        }
        Ok(memory)
    }

    /// Memory built from explicit objects, `objects[0]` being the null slot.
    ///
    /// # Errors
    ///
    /// Rejects layouts that do not match `config`, pointers outside memory
    /// and pointers to stack slots.
    pub fn from_objects(config: &TrialConfig, objects: Vec<Object>) -> Result<Self, ConfigError> {
        let memory = Self {
            objects,
            num_threads: config.num_threads,
        };
        memory.check_layout(config)?;
        memory.validate()?;
        Ok(memory)
    }

    /// Check that this memory was laid out for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or its thread or slot count
    /// differs from this memory's.
    pub fn check_layout(&self, config: &TrialConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if self.num_threads != config.num_threads {
            return Err(ConfigError::ThreadCountMismatch {
                expected: config.num_threads,
                actual: self.num_threads,
            });
        }
        if self.len() != config.num_slots {
            return Err(ConfigError::SlotCountMismatch {
                expected: config.num_slots,
                actual: self.len(),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let null = self.objects[Slot::NULL.index()];
        if null != Object::default() {
            return Err(ConfigError::NullSlotInUse {
                left: null.left,
                right: null.right,
            });
        }
        for (index, object) in self.objects.iter().enumerate().skip(1) {
            let slot = Slot(index);
            if self.is_stack(slot) && object.right != Slot::NULL {
                return Err(ConfigError::StackRightInUse {
                    slot,
                    target: object.right,
                });
            }
            for target in [object.left, object.right] {
                if target.index() >= self.len() {
                    return Err(ConfigError::DanglingPointer { slot, target });
                }
                if self.is_stack(target) {
                    return Err(ConfigError::HeapPointsToStack { slot, target });
                }
            }
        }
        Ok(())
    }

    /// Total number of slots, null included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Memory always holds at least the null slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of stack slots.
    #[must_use]
    pub const fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Stack slot of `thread`.
    ///
    /// # Panics
    ///
    /// Panics if `thread` has no stack.
    #[must_use]
    pub fn stack_slot(&self, thread: usize) -> Slot {
        assert!(
            thread < self.num_threads,
            "thread {thread} has no stack ({} threads)",
            self.num_threads
        );
        Slot(1 + thread)
    }

    /// The global root, which is also the first heap slot.
    #[must_use]
    pub const fn global_root(&self) -> Slot {
        Slot(1 + self.num_threads)
    }

    /// Whether `slot` is a thread stack.
    #[must_use]
    pub const fn is_stack(&self, slot: Slot) -> bool {
        slot.index() >= 1 && slot.index() <= self.num_threads
    }

    /// Whether `slot` is a heap object.
    #[must_use]
    pub fn is_heap(&self, slot: Slot) -> bool {
        slot >= self.global_root() && slot.index() < self.len()
    }

    /// Heap slots in ascending order, starting at the global root.
    pub fn heap_slots(&self) -> impl Iterator<Item = Slot> {
        (self.global_root().index()..self.len()).map(Slot)
    }

    /// Object stored at `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&Object> {
        self.objects.get(slot.index())
    }

    /// Object stored at `slot`.
    ///
    /// # Panics
    ///
    /// Panics with a memory dump if `slot` is null or out of range; both
    /// mean a pointer escaped the layout invariants.
    #[must_use]
    pub fn object(&self, slot: Slot) -> Object {
        match self.get(slot) {
            Some(object) if !slot.is_null() => *object,
            _ => panic!("dereference of invalid slot {slot}\nmemory: {self}"),
        }
    }

    /// `left` field of `slot`.
    #[must_use]
    pub fn left(&self, slot: Slot) -> Slot {
        self.object(slot).left
    }

    /// `right` field of `slot`.
    #[must_use]
    pub fn right(&self, slot: Slot) -> Slot {
        self.object(slot).right
    }

    /// Store `value` into the `left` field of `slot`.
    pub fn set_left(&mut self, slot: Slot, value: Slot) {
        self.object_mut(slot).left = value;
    }

    /// Store `value` into the `right` field of `slot`.
    pub fn set_right(&mut self, slot: Slot, value: Slot) {
        self.object_mut(slot).right = value;
    }

    fn object_mut(&mut self, slot: Slot) -> &mut Object {
        if slot.is_null() || slot.index() >= self.len() {
            panic!("store to invalid slot {slot}\nmemory: {self}");
        }
        &mut self.objects[slot.index()]
    }

    /// Null or one ambiguously chosen heap slot.
    pub fn ambiguous_heap_pointer<C: Chooser + ?Sized>(&self, chooser: &mut C) -> Slot {
        match choose(chooser, self.len() - self.global_root().index() + 1) {
            0 => Slot::NULL,
            x => Slot(self.global_root().index() + x - 1),
        }
    }

    /// An ambiguously chosen heap slot that is currently reachable from the
    /// global root. The object may or may not be marked.
    pub fn ambiguous_reachable_heap_pointer<C: Chooser + ?Sized>(&self, chooser: &mut C) -> Slot {
        let reachable = self.reachable_from(self.global_root());
        let candidates: Vec<Slot> = self
            .heap_slots()
            .filter(|&slot| reachable.is_marked(slot))
            .collect();
        candidates[choose(chooser, candidates.len())]
    }

    /// Every slot reachable from `root`, without yielding.
    #[must_use]
    pub fn reachable_from(&self, root: Slot) -> MarkBitmap {
        let mut reachable = MarkBitmap::new(self.len());
        let mut pending = vec![root];
        while let Some(slot) = pending.pop() {
            if slot.is_null() || !reachable.mark(slot) {
                continue;
            }
            let object = self.object(slot);
            pending.push(object.right);
            pending.push(object.left);
        }
        reachable
    }

    /// Display adapter that flags marked slots with `*`.
    #[must_use]
    pub const fn dump<'a>(&'a self, marks: Option<&'a MarkBitmap>) -> MemoryDump<'a> {
        MemoryDump {
            memory: self,
            marks,
        }
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(None).fmt(f)
    }
}

/// `Display` form of a memory, one `i->left,right` entry per slot.
pub struct MemoryDump<'a> {
    memory: &'a Memory,
    marks: Option<&'a MarkBitmap>,
}

impl fmt::Display for MemoryDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, object) in self.memory.objects.iter().enumerate().skip(1) {
            if index > 1 {
                f.write_str(" ")?;
            }
            let slot = Slot(index);
            let flag = match self.marks {
                Some(marks) if slot.index() < marks.capacity() && marks.is_marked(slot) => "*",
                _ => " ",
            };
            write!(f, "{flag}{slot}->{},{}", object.left, object.right)?;
        }
        Ok(())
    }
}

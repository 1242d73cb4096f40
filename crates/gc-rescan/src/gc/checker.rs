//! Post-cycle mark completeness check.
//!
//! Walks the graph from every root independently of the mark engine and
//! fails on the first reachable object whose mark bit is clear.

use crate::error::Fault;
use crate::gc::mark::MarkBitmap;
use crate::heap::{Memory, Slot};

/// Check that everything reachable from `start` is marked.
///
/// `root` is reported in the fault as the place the walk started from.
///
/// # Errors
///
/// Returns [`Fault::MissedObject`] for the first unmarked object found,
/// walking left fields before right fields.
pub fn check_from(
    memory: &Memory,
    marks: &MarkBitmap,
    root: Slot,
    start: Slot,
) -> Result<(), Fault> {
    let mut visited = MarkBitmap::new(memory.len());
    let mut pending = vec![start];
    while let Some(slot) = pending.pop() {
        if slot.is_null() || !visited.mark(slot) {
            continue;
        }
        if !marks.is_marked(slot) {
            return Err(Fault::MissedObject { slot, root });
        }
        let object = memory.object(slot);
        pending.push(object.right);
        pending.push(object.left);
    }
    Ok(())
}

/// Check the global root, then every thread's stack in thread order.
///
/// # Errors
///
/// Returns the first fault found.
pub fn check_roots(memory: &Memory, marks: &MarkBitmap) -> Result<(), Fault> {
    let root = memory.global_root();
    check_from(memory, marks, root, root)?;
    for thread in 0..memory.num_threads() {
        let stack = memory.stack_slot(thread);
        check_from(memory, marks, stack, memory.left(stack))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrialConfig;
    use crate::heap::Object;

    /// stack0 -> 5; root(3) -> 4 -> 5.
    fn memory() -> Memory {
        Memory::from_objects(
            &TrialConfig::default(),
            vec![
                Object::default(),
                Object::new(Slot(5), Slot::NULL),
                Object::default(),
                Object::new(Slot::NULL, Slot(4)),
                Object::new(Slot(5), Slot(4)),
                Object::default(),
            ],
        )
        .unwrap()
    }

    fn marks(slots: &[usize]) -> MarkBitmap {
        let mut marks = MarkBitmap::new(6);
        for &slot in slots {
            marks.mark(Slot(slot));
        }
        marks
    }

    #[test]
    fn test_fully_marked_passes() {
        assert_eq!(check_roots(&memory(), &marks(&[3, 4, 5])), Ok(()));
    }

    #[test]
    fn test_unmarked_root() {
        assert_eq!(
            check_roots(&memory(), &marks(&[])),
            Err(Fault::MissedObject {
                slot: Slot(3),
                root: Slot(3)
            })
        );
    }

    #[test]
    fn test_unmarked_object_below_root() {
        assert_eq!(
            check_roots(&memory(), &marks(&[3, 4])),
            Err(Fault::MissedObject {
                slot: Slot(5),
                root: Slot(3)
            })
        );
    }

    #[test]
    fn test_stack_root_is_reported() {
        let mut memory = memory();
        memory.set_right(Slot(3), Slot::NULL);
        assert_eq!(
            check_roots(&memory, &marks(&[3])),
            Err(Fault::MissedObject {
                slot: Slot(5),
                root: Slot(1)
            })
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let memory = memory();
        assert_eq!(check_from(&memory, &marks(&[4, 5]), Slot(3), Slot(4)), Ok(()));
    }

    #[test]
    fn test_null_start_passes() {
        assert_eq!(
            check_from(&memory(), &marks(&[]), Slot(2), Slot::NULL),
            Ok(())
        );
    }
}

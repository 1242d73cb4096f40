//! Integration tests for hand-driven collector scenarios and the
//! stop-the-world lock.

use gc_rescan::gc::StwLock;
use gc_rescan::{
    run_trial, BarrierPolicy, Collector, CollectorPhase, Fault, Memory, Object, RandomChooser,
    Replay, ScanRestart, Slot, TransitiveMark, Trial, TrialConfig, Unbarriered,
};

fn all_zero<P: BarrierPolicy>() {
    let config = TrialConfig::default();
    let report = run_trial::<P>(&config, &mut Replay::default()).unwrap();
    // Only the global root exists as far as the collector can tell.
    assert_eq!(report.metrics.objects_marked(), 1, "{}", P::NAME);
    assert_eq!(report.metrics.rescans, 2);
    assert_eq!(report.metrics.scan_restarts, 0);
}

#[test]
fn test_all_zero_choices_pass_under_every_policy() {
    all_zero::<TransitiveMark>();
    all_zero::<ScanRestart>();
    all_zero::<Unbarriered>();
}

#[test]
fn test_all_zero_marking_phase_marks_only_root() {
    let config = TrialConfig::default();
    let mut chooser = Replay::default();
    let mut trial = Trial::<TransitiveMark>::new(&config, &mut chooser).unwrap();

    while trial.state().phase() == CollectorPhase::Marking {
        assert!(trial.step().unwrap());
    }
    assert_eq!(
        trial.state().marks().iter_marked().collect::<Vec<_>>(),
        vec![Slot(3)]
    );
    assert!(!trial.is_finished());
    trial.run().unwrap();
    assert!(trial.is_finished());
    assert_eq!(trial.state().marks().marked_count(), 1);
}

/// Stack 0 -> A (4); H (5) reachable from nowhere yet.
fn stack_to_a() -> Memory {
    Memory::from_objects(
        &TrialConfig::default(),
        vec![
            Object::default(),
            Object::new(Slot(4), Slot::NULL),
            Object::default(),
            Object::default(),
            Object::default(),
            Object::default(),
        ],
    )
    .unwrap()
}

/// Move H onto stack 0 after its rescan started, bypassing the barrier
/// except for the scan-restart check.
fn scan_restart_scenario(config: &TrialConfig) -> (Result<(), Fault>, usize, bool) {
    let mut chooser = Replay::default();
    let mut trial = Trial::<ScanRestart>::with_collector(
        stack_to_a(),
        Collector::new(config).without_mutators(),
        &mut chooser,
    );
    while trial.state().scan_clock() == 0 {
        trial.step().unwrap();
    }
    let state = trial.state_mut();
    state.memory_mut().set_left(Slot(1), Slot(5));
    ScanRestart::before_publish(state, Slot(5));

    let result = trial.run().map(|_| ());
    let metrics = trial.state().metrics();
    (result, metrics.rescans, metrics.rescan_budget_exhausted)
}

#[test]
fn test_scan_restart_repeats_rescans_until_marked() {
    let (result, rescans, exhausted) = scan_restart_scenario(&TrialConfig::default());
    assert_eq!(result, Ok(()));
    assert_eq!(rescans, 3);
    assert!(!exhausted);
}

#[test]
fn test_scan_restart_budget_exhausted_reports_object() {
    let (result, rescans, exhausted) =
        scan_restart_scenario(&TrialConfig::default().max_rescans(1));
    assert_eq!(
        result,
        Err(Fault::MissedObject {
            slot: Slot(5),
            root: Slot(1),
        })
    );
    assert_eq!(rescans, 1);
    assert!(exhausted);
}

/// The collector never checks while a barrier still holds the shared lock.
#[test]
fn test_check_never_overlaps_shared_holder() {
    let config = TrialConfig::default();
    for seed in 0..2_000 {
        let report = run_trial::<TransitiveMark>(&config, &mut RandomChooser::new(seed)).unwrap();
        assert_eq!(report.metrics.shared_holders_at_check, 0, "seed {seed}");
    }
}

#[test]
fn test_stw_lock_modes_exclude_each_other() {
    let mut lock = StwLock::new();
    assert!(lock.try_read());
    assert!(lock.try_read());
    assert!(!lock.try_write());
    lock.read_unlock();
    assert!(!lock.can_write());
    lock.read_unlock();

    assert!(lock.try_write());
    assert!(!lock.try_read());
    assert!(!lock.can_read());
    lock.write_unlock();
    assert_eq!(lock, StwLock::new());
}

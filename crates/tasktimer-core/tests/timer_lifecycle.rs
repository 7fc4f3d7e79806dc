//! End-to-end timer lifecycle tests.
//!
//! Drive the coordinator the way the CLI does: catalog setup, start, ticks,
//! acknowledgments, and a restart in the middle of a subtask.

use proptest::prelude::*;
use tasktimer_core::error::AlarmError;
use tasktimer_core::timer::{AlarmRequest, SequencerState, TimerProgress};
use tasktimer_core::{
    AlarmPresenter, Algorithm, Catalog, Database, Event, KvStore, ProgressStore, Subtask,
    SubtaskSequencer, TaskCoordinator,
};

#[derive(Default)]
struct Recorder {
    alarms: Vec<AlarmRequest>,
}

impl AlarmPresenter for Recorder {
    fn present(&mut self, request: &AlarmRequest) -> Result<(), AlarmError> {
        self.alarms.push(request.clone());
        Ok(())
    }
}

fn algorithm(name: &str, durations: &[u64]) -> Algorithm {
    let subtasks = durations
        .iter()
        .enumerate()
        .map(|(i, d)| Subtask::new(format!("{name} {i}"), *d))
        .collect();
    Algorithm::new(name, subtasks).unwrap()
}

fn seed(db: &Database, number: u32, algo: Algorithm) {
    let catalog = Catalog::new(db);
    let name = algo.name.clone();
    catalog.add_algorithm(algo).unwrap();
    catalog.create_task(number, &name).unwrap();
}

/// Tick and acknowledge until the task finishes. Returns the alarm count.
fn run_to_completion<S: KvStore>(coord: &mut TaskCoordinator<S, Recorder>, number: u32) -> usize {
    for _ in 0..10_000 {
        if !coord.registry().contains(number) {
            break;
        }
        coord.tick(1000).unwrap();
        let waiting = matches!(
            coord.registry().get(number).map(|s| s.state()),
            Some(SequencerState::AwaitingAck { .. })
        );
        if waiting {
            assert!(coord.acknowledge(number).unwrap());
        }
    }
    coord.presenter().alarms.len()
}

#[test]
fn two_tasks_run_independently() {
    let db = Database::open_memory().unwrap();
    seed(&db, 1, algorithm("Short", &[1, 1]));
    seed(&db, 2, algorithm("Long", &[3]));
    let mut coord = TaskCoordinator::new(db, Recorder::default());
    let mut events = coord.subscribe();

    coord.start_task(1).unwrap();
    coord.start_task(2).unwrap();
    coord.tick(1000).unwrap();

    // Task 1 waits for its ack, task 2 keeps counting.
    assert_eq!(
        coord.registry().get(1).unwrap().state(),
        SequencerState::AwaitingAck { index: 0 }
    );
    coord.tick(1000).unwrap();
    assert_eq!(coord.registry().get(2).unwrap().remaining_ms(), Some(1000));

    assert!(coord.stop_task(2).unwrap());
    assert!(coord.registry().contains(1));
    assert!(ProgressStore::new(coord.store()).load(2).unwrap().is_none());
    assert!(ProgressStore::new(coord.store()).load(1).unwrap().is_some());

    let stopped = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::TaskStopped { .. }))
        .count();
    assert_eq!(stopped, 1);
}

#[test]
fn restart_resumes_mid_subtask() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasktimer.db");

    {
        let db = Database::open_at(&path).unwrap();
        seed(&db, 7, algorithm("Bake", &[5, 10, 5]));
        let mut coord = TaskCoordinator::new(db, Recorder::default());
        coord.start_task(7).unwrap();
        for _ in 0..5 {
            coord.tick(1000).unwrap();
        }
        coord.acknowledge(7).unwrap();
        coord.tick(1000).unwrap();
        coord.tick(1000).unwrap();
        // Process dies here.
    }

    let db = Database::open_at(&path).unwrap();
    let stored = ProgressStore::new(&db).load(7).unwrap().unwrap();
    assert_eq!(
        stored.progress,
        TimerProgress {
            index: 1,
            remaining_ms: 8000
        }
    );
    assert_eq!(stored.next_description.as_deref(), Some("Bake 2"));

    let mut coord = TaskCoordinator::new(db, Recorder::default());
    assert_eq!(coord.resume_all().unwrap(), vec![7]);
    assert_eq!(coord.registry().get(7).unwrap().remaining_ms(), Some(8000));
    assert_eq!(run_to_completion(&mut coord, 7), 2);
    assert!(ProgressStore::new(coord.store()).load(7).unwrap().is_none());
}

#[test]
fn edit_between_runs_discards_stale_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasktimer.db");

    {
        let db = Database::open_at(&path).unwrap();
        seed(&db, 3, algorithm("Soup", &[10, 10, 10]));
        let mut coord = TaskCoordinator::new(db, Recorder::default());
        coord.start_task(3).unwrap();
        coord.tick(1000).unwrap();
    }

    let db = Database::open_at(&path).unwrap();
    Catalog::new(&db)
        .update_algorithm("Soup", algorithm("Soup", &[60, 1, 1]))
        .unwrap();

    let mut coord = TaskCoordinator::new(db, Recorder::default());
    assert!(coord.resume_all().unwrap().is_empty());
    assert!(coord.is_idle());
    assert!(!coord.catalog().find_task(3).unwrap().unwrap().is_running);

    coord.start_task(3).unwrap();
    assert_eq!(coord.registry().get(3).unwrap().remaining_ms(), Some(60_000));
}

#[test]
fn catalog_edit_during_run_only_touches_stored_snapshot() {
    let db = Database::open_memory().unwrap();
    seed(&db, 1, algorithm("A", &[2, 2]));
    let mut coord = TaskCoordinator::new(db, Recorder::default());
    coord.start_task(1).unwrap();

    coord
        .update_algorithm("A", algorithm("A", &[60]))
        .unwrap();
    let task = coord.catalog().find_task(1).unwrap().unwrap();
    assert_eq!(task.total_time(), 60);

    assert_eq!(coord.registry().get(1).unwrap().len(), 2);
    assert_eq!(run_to_completion(&mut coord, 1), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn uninterrupted_run_alarms_once_per_subtask(durations in prop::collection::vec(0u64..5, 0..6)) {
        let db = Database::open_memory().unwrap();
        seed(&db, 1, algorithm("P", &durations));
        let mut coord = TaskCoordinator::new(db, Recorder::default());
        coord.start_task(1).unwrap();
        let alarms = run_to_completion(&mut coord, 1);
        prop_assert_eq!(alarms, durations.len());
        prop_assert!(coord.is_idle());
        prop_assert!(!coord.catalog().find_task(1).unwrap().unwrap().is_running);
    }

    #[test]
    fn resume_continues_from_exact_point(
        durations in prop::collection::vec(2u64..20, 2..6),
        pick in any::<prop::sample::Index>(),
        fraction in 1u64..1000,
    ) {
        let index = 1 + pick.index(durations.len() - 1);
        let duration_ms = durations[index] * 1000;
        let remaining_ms = (duration_ms * fraction / 1000).clamp(1, duration_ms - 1);

        let mut seq = SubtaskSequencer::new(1, &algorithm("R", &durations));
        seq.resume(TimerProgress { index, remaining_ms }).unwrap();
        prop_assert_eq!(seq.state(), SequencerState::Counting { index, remaining_ms });
    }
}

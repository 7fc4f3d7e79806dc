//! Algorithm catalog and task list.
//!
//! Both collections are stored whole, as JSON arrays under the `algorithms`
//! and `tasks` keys. Every mutation is load, modify, save.

use chrono::Utc;
use tracing::{debug, info};

use super::database::KvStore;
use super::progress::ProgressStore;
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::model::{Algorithm, Task};

pub const ALGORITHMS_KEY: &str = "algorithms";
pub const TASKS_KEY: &str = "tasks";

/// Result of [`Catalog::update_algorithm`].
#[derive(Debug, Clone)]
pub struct AlgorithmUpdate {
    pub algorithm: Algorithm,
    pub previous_name: String,
    pub tasks_synced: usize,
}

impl AlgorithmUpdate {
    pub fn event(&self) -> Event {
        Event::AlgorithmUpdated {
            name: self.algorithm.name.clone(),
            previous_name: self.previous_name.clone(),
            tasks_synced: self.tasks_synced,
            at: Utc::now(),
        }
    }
}

pub struct Catalog<'a, S: KvStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KvStore + ?Sized> Catalog<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    // ── Whole-collection access ──────────────────────────────────────

    /// Load all algorithms. Totals are recomputed on the way in.
    pub fn load_algorithms(&self) -> Result<Vec<Algorithm>> {
        let Some(json) = self.kv.kv_get(ALGORITHMS_KEY)? else {
            return Ok(Vec::new());
        };
        let mut algorithms: Vec<Algorithm> = serde_json::from_str(&json)?;
        for algorithm in &mut algorithms {
            algorithm.recompute_total_time();
        }
        Ok(algorithms)
    }

    pub fn save_algorithms(&self, algorithms: &[Algorithm]) -> Result<()> {
        let json = serde_json::to_string(algorithms)?;
        self.kv.kv_set(ALGORITHMS_KEY, &json)?;
        debug!(count = algorithms.len(), "saved algorithms");
        Ok(())
    }

    /// Load all tasks, sorted by number.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        let Some(json) = self.kv.kv_get(TASKS_KEY)? else {
            return Ok(Vec::new());
        };
        let mut tasks: Vec<Task> = serde_json::from_str(&json)?;
        tasks.sort_by_key(|t| t.number);
        Ok(tasks)
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let mut sorted = tasks.to_vec();
        sorted.sort_by_key(|t| t.number);
        let json = serde_json::to_string(&sorted)?;
        self.kv.kv_set(TASKS_KEY, &json)?;
        debug!(count = sorted.len(), "saved tasks");
        Ok(())
    }

    // ── Algorithms ───────────────────────────────────────────────────

    pub fn find_algorithm(&self, name: &str) -> Result<Option<Algorithm>> {
        Ok(self
            .load_algorithms()?
            .into_iter()
            .find(|a| a.name == name.trim()))
    }

    pub fn add_algorithm(&self, mut algorithm: Algorithm) -> Result<Algorithm> {
        algorithm.validate()?;
        algorithm.recompute_total_time();
        let mut algorithms = self.load_algorithms()?;
        if algorithms.iter().any(|a| a.name == algorithm.name) {
            return Err(ValidationError::DuplicateAlgorithm {
                name: algorithm.name,
            }
            .into());
        }
        algorithms.push(algorithm.clone());
        self.save_algorithms(&algorithms)?;
        info!(name = %algorithm.name, subtasks = algorithm.subtasks.len(), "algorithm added");
        Ok(algorithm)
    }

    /// Replace `original_name` with `updated` and resync task snapshots.
    ///
    /// Renaming is allowed as long as the new name is free.
    pub fn update_algorithm(
        &self,
        original_name: &str,
        mut updated: Algorithm,
    ) -> Result<AlgorithmUpdate> {
        let original_name = original_name.trim();
        updated.validate()?;
        updated.recompute_total_time();
        let mut algorithms = self.load_algorithms()?;
        let Some(pos) = algorithms.iter().position(|a| a.name == original_name) else {
            return Err(ValidationError::UnknownAlgorithm {
                name: original_name.to_string(),
            }
            .into());
        };
        if updated.name != original_name && algorithms.iter().any(|a| a.name == updated.name) {
            return Err(ValidationError::DuplicateAlgorithm { name: updated.name }.into());
        }
        algorithms[pos] = updated.clone();
        self.save_algorithms(&algorithms)?;

        let tasks_synced = self.sync_tasks(original_name, &updated)?;
        info!(name = %updated.name, previous = original_name, tasks_synced, "algorithm updated");
        Ok(AlgorithmUpdate {
            algorithm: updated,
            previous_name: original_name.to_string(),
            tasks_synced,
        })
    }

    /// Refresh the snapshot of every task that references `original_name`.
    ///
    /// Saved progress points into the old subtask list, so a task whose
    /// subtasks changed loses it and is no longer marked running.
    pub fn sync_tasks(&self, original_name: &str, updated: &Algorithm) -> Result<usize> {
        let mut tasks = self.load_tasks()?;
        let progress = ProgressStore::new(self.kv);
        let mut synced = 0;
        for task in &mut tasks {
            let subtasks_changed = task.algorithm.subtasks != updated.subtasks;
            if !task.sync_algorithm(original_name, updated) {
                continue;
            }
            synced += 1;
            if subtasks_changed {
                progress.clear(task.number)?;
                task.is_running = false;
            }
        }
        if synced > 0 {
            self.save_tasks(&tasks)?;
        }
        Ok(synced)
    }

    /// Remove an algorithm. Task snapshots are left alone.
    pub fn delete_algorithm(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        let mut algorithms = self.load_algorithms()?;
        let before = algorithms.len();
        algorithms.retain(|a| a.name != name);
        if algorithms.len() == before {
            return Ok(false);
        }
        self.save_algorithms(&algorithms)?;
        info!(name, "algorithm deleted");
        Ok(true)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn find_task(&self, number: u32) -> Result<Option<Task>> {
        Ok(self.load_tasks()?.into_iter().find(|t| t.number == number))
    }

    /// Create a task bound to a snapshot of `algorithm_name`.
    pub fn create_task(&self, number: u32, algorithm_name: &str) -> Result<Task> {
        let mut tasks = self.load_tasks()?;
        if tasks.iter().any(|t| t.number == number) {
            return Err(ValidationError::DuplicateTaskNumber { number }.into());
        }
        let algorithm = self.find_algorithm(algorithm_name)?.ok_or_else(|| {
            ValidationError::UnknownAlgorithm {
                name: algorithm_name.to_string(),
            }
        })?;
        let task = Task::new(number, algorithm);
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;
        info!(number, algorithm = %task.algorithm.name, "task created");
        Ok(task)
    }

    /// Remove a task and its persisted timer progress.
    pub fn delete_task(&self, number: u32) -> Result<bool> {
        let mut tasks = self.load_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.number != number);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save_tasks(&tasks)?;
        ProgressStore::new(self.kv).clear(number)?;
        info!(number, "task deleted");
        Ok(true)
    }

    pub fn set_running(&self, number: u32, running: bool) -> Result<()> {
        let mut tasks = self.load_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.number == number)
            .ok_or(ValidationError::UnknownTask { number })?;
        if task.is_running != running {
            task.is_running = running;
            self.save_tasks(&tasks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::Subtask;
    use crate::storage::Database;
    use crate::timer::TimerProgress;

    fn algo(name: &str, durations: &[u64]) -> Algorithm {
        Algorithm::new(
            name,
            durations.iter().map(|d| Subtask::new("s", *d)).collect(),
        )
        .unwrap()
    }

    fn validation(err: CoreError) -> ValidationError {
        match err {
            CoreError::Validation(v) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_store_loads_empty_lists() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        assert!(catalog.load_algorithms().unwrap().is_empty());
        assert!(catalog.load_tasks().unwrap().is_empty());
    }

    #[test]
    fn save_load_is_idempotent() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        let mut high = algo("B", &[5]);
        high.subtasks[0].is_high_priority = true;
        let list = vec![algo("A", &[1, 2, 3]), high, algo("Empty", &[])];

        catalog.save_algorithms(&list).unwrap();
        let first = catalog.load_algorithms().unwrap();
        catalog.save_algorithms(&first).unwrap();
        let second = catalog.load_algorithms().unwrap();
        assert_eq!(first, list);
        assert_eq!(second, first);
        assert_eq!(db.kv_get(ALGORITHMS_KEY).unwrap().unwrap(), serde_json::to_string(&list).unwrap());
    }

    #[test]
    fn load_repairs_stale_totals() {
        let db = Database::open_memory().unwrap();
        db.kv_set(
            ALGORITHMS_KEY,
            r#"[{"name":"X","subtasks":[{"description":"a","duration":4}],"totalTime":99}]"#,
        )
        .unwrap();
        let loaded = Catalog::new(&db).load_algorithms().unwrap();
        assert_eq!(loaded[0].total_time, 4);
    }

    #[test]
    fn add_algorithm_rejects_duplicates_and_blank_names() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        let err = catalog.add_algorithm(algo("A", &[2])).unwrap_err();
        assert_eq!(
            validation(err),
            ValidationError::DuplicateAlgorithm { name: "A".into() }
        );

        let blank = Algorithm {
            name: "  ".into(),
            subtasks: vec![],
            total_time: 0,
        };
        assert_eq!(
            validation(catalog.add_algorithm(blank).unwrap_err()),
            ValidationError::EmptyName
        );
    }

    #[test]
    fn task_numbers_are_unique() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        catalog.create_task(1, "A").unwrap();
        let err = catalog.create_task(1, "A").unwrap_err();
        assert_eq!(
            validation(err),
            ValidationError::DuplicateTaskNumber { number: 1 }
        );
        assert_eq!(catalog.load_tasks().unwrap().len(), 1);
    }

    #[test]
    fn create_task_requires_known_algorithm() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        let err = catalog.create_task(1, "Missing").unwrap_err();
        assert_eq!(
            validation(err),
            ValidationError::UnknownAlgorithm {
                name: "Missing".into()
            }
        );
    }

    #[test]
    fn tasks_are_kept_sorted() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        for n in [3, 1, 2] {
            catalog.create_task(n, "A").unwrap();
        }
        let numbers: Vec<_> = catalog.load_tasks().unwrap().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn update_algorithm_resyncs_snapshots() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        catalog.add_algorithm(algo("B", &[1])).unwrap();
        catalog.create_task(1, "A").unwrap();
        catalog.create_task(2, "A").unwrap();
        catalog.create_task(3, "B").unwrap();

        let update = catalog.update_algorithm("A", algo("A2", &[10, 20])).unwrap();
        assert_eq!(update.tasks_synced, 2);
        assert!(matches!(
            update.event(),
            Event::AlgorithmUpdated { ref name, tasks_synced: 2, .. } if name == "A2"
        ));

        let tasks = catalog.load_tasks().unwrap();
        assert_eq!(tasks[0].algorithm.name, "A2");
        assert_eq!(tasks[0].total_time(), 30);
        assert_eq!(tasks[2].algorithm.name, "B");
        assert!(catalog.find_algorithm("A").unwrap().is_none());
    }

    #[test]
    fn rename_onto_existing_name_is_rejected() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        catalog.add_algorithm(algo("B", &[1])).unwrap();
        let err = catalog.update_algorithm("A", algo("B", &[2])).unwrap_err();
        assert_eq!(
            validation(err),
            ValidationError::DuplicateAlgorithm { name: "B".into() }
        );
    }

    #[test]
    fn lookups_ignore_surrounding_whitespace() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[1])).unwrap();
        catalog.create_task(1, " A ").unwrap();
        assert!(catalog.find_algorithm(" A").unwrap().is_some());

        let update = catalog.update_algorithm(" A", algo("A", &[1, 2])).unwrap();
        assert_eq!(update.previous_name, "A");
        assert_eq!(update.tasks_synced, 1);
        assert!(catalog.delete_algorithm("A ").unwrap());
        assert!(catalog.load_algorithms().unwrap().is_empty());
    }

    #[test]
    fn changed_subtasks_drop_saved_progress() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[10, 10])).unwrap();
        catalog.create_task(1, "A").unwrap();
        catalog.create_task(2, "A").unwrap();
        catalog.set_running(1, true).unwrap();
        let saved = TimerProgress {
            index: 1,
            remaining_ms: 4000,
        };
        ProgressStore::new(&db).save(1, saved, None).unwrap();

        // Rename only: the list is the same, progress still applies.
        catalog.update_algorithm("A", algo("B", &[10, 10])).unwrap();
        assert_eq!(ProgressStore::new(&db).load(1).unwrap().unwrap().progress, saved);

        catalog.update_algorithm("B", algo("B", &[30, 5, 5])).unwrap();
        assert!(ProgressStore::new(&db).load(1).unwrap().is_none());
        assert!(!catalog.find_task(1).unwrap().unwrap().is_running);
    }

    #[test]
    fn delete_algorithm_keeps_task_snapshots() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[7])).unwrap();
        catalog.create_task(1, "A").unwrap();
        assert!(catalog.delete_algorithm("A").unwrap());
        assert!(!catalog.delete_algorithm("A").unwrap());
        assert_eq!(catalog.find_task(1).unwrap().unwrap().total_time(), 7);
    }

    #[test]
    fn delete_task_clears_progress() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[7])).unwrap();
        catalog.create_task(4, "A").unwrap();
        ProgressStore::new(&db)
            .save(
                4,
                TimerProgress {
                    index: 0,
                    remaining_ms: 100,
                },
                None,
            )
            .unwrap();

        assert!(catalog.delete_task(4).unwrap());
        assert!(ProgressStore::new(&db).load(4).unwrap().is_none());
        assert!(!catalog.delete_task(4).unwrap());
    }

    #[test]
    fn set_running_flips_flag() {
        let db = Database::open_memory().unwrap();
        let catalog = Catalog::new(&db);
        catalog.add_algorithm(algo("A", &[7])).unwrap();
        catalog.create_task(1, "A").unwrap();
        catalog.set_running(1, true).unwrap();
        assert!(catalog.find_task(1).unwrap().unwrap().is_running);
        assert!(catalog.set_running(2, true).is_err());
    }
}

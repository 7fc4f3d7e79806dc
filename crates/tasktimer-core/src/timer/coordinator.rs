//! Task coordinator.
//!
//! Single owner of everything a running timer touches: the registry of
//! active sequencers, the key-value store, the alarm presenter and the
//! event bus. All mutation goes through `&mut self`; the caller decides
//! how often to call [`TaskCoordinator::tick`].

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::alarm::{AlarmPresenter, AlarmRequest};
use super::registry::{NotificationView, TimerRegistry};
use super::sequencer::{SequencerState, SubtaskSequencer};
use crate::error::{Result, ValidationError};
use crate::events::{Event, EventBus, EventSubscriber};
use crate::model::Algorithm;
use crate::storage::{AlgorithmUpdate, Catalog, KvStore, ProgressStore};

pub struct TaskCoordinator<S: KvStore, P: AlarmPresenter> {
    store: S,
    presenter: P,
    registry: TimerRegistry,
    bus: EventBus,
    /// Alarms whose presentation failed, keyed by task number.
    pending_alarms: BTreeMap<u32, AlarmRequest>,
}

impl<S: KvStore, P: AlarmPresenter> TaskCoordinator<S, P> {
    pub fn new(store: S, presenter: P) -> Self {
        Self::with_bus(store, presenter, EventBus::default())
    }

    pub fn with_bus(store: S, presenter: P, bus: EventBus) -> Self {
        Self {
            store,
            presenter,
            registry: TimerRegistry::new(),
            bus,
            pending_alarms: BTreeMap::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn catalog(&self) -> Catalog<'_, S> {
        Catalog::new(&self.store)
    }

    pub fn progress(&self) -> ProgressStore<'_, S> {
        ProgressStore::new(&self.store)
    }

    /// No task is counting or waiting for acknowledgment.
    pub fn is_idle(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn pending_alarm_count(&self) -> usize {
        self.pending_alarms.len()
    }

    pub fn notification(&self) -> Option<NotificationView> {
        self.registry.notification()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start timing task `number` from its first subtask.
    ///
    /// # Errors
    /// `UnknownTask` if no such task is stored, `AlreadyRunning` if it is
    /// registered already, or a storage error.
    pub fn start_task(&mut self, number: u32) -> Result<()> {
        if self.registry.contains(number) {
            return Err(ValidationError::AlreadyRunning { number }.into());
        }
        let task = self
            .catalog()
            .find_task(number)?
            .ok_or(ValidationError::UnknownTask { number })?;

        let mut sequencer = SubtaskSequencer::new(number, &task.algorithm);
        self.bus.emit(Event::TaskStarted {
            task_number: number,
            subtask_count: sequencer.len(),
            at: Utc::now(),
        });
        let event = sequencer.start();

        if sequencer.state() == SequencerState::Completed {
            info!(task = number, "task has no subtasks, completed immediately");
            self.progress().clear(number)?;
            self.catalog().set_running(number, false)?;
            if let Some(event) = event {
                self.bus.emit(event);
            }
            return Ok(());
        }

        info!(task = number, algorithm = %task.algorithm.name, "task started");
        self.persist(&sequencer);
        self.registry.register(sequencer)?;
        self.catalog().set_running(number, true)?;
        if let Some(event) = event {
            self.bus.emit(event);
        }
        Ok(())
    }

    /// Stop task `number` and forget its progress.
    ///
    /// Returns whether a registered sequencer was stopped. Persisted progress
    /// is cleared either way.
    pub fn stop_task(&mut self, number: u32) -> Result<bool> {
        self.pending_alarms.remove(&number);
        let stopped = match self.registry.unregister(number) {
            Some(mut sequencer) => {
                let event = sequencer.stop();
                if let Some(event) = event {
                    self.bus.emit(event);
                }
                true
            }
            None => false,
        };
        self.progress().clear(number)?;
        if self.catalog().find_task(number)?.is_some() {
            self.catalog().set_running(number, false)?;
        }
        if stopped {
            info!(task = number, "task stopped");
        } else {
            debug!(task = number, "stop for task that was not running");
        }
        Ok(stopped)
    }

    /// Advance every registered sequencer by `elapsed_ms`.
    ///
    /// Progress write failures are logged and absorbed; the next tick
    /// writes again.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<()> {
        let mut expired = Vec::new();
        let mut events = Vec::new();
        for sequencer in self.registry.iter_mut() {
            if let Some(event) = sequencer.tick(elapsed_ms) {
                if matches!(event, Event::SubtaskExpired { .. }) {
                    if let Some(request) = sequencer.alarm_request() {
                        expired.push(request);
                    }
                }
                events.push(event);
            }
        }
        for sequencer in self.registry.iter() {
            if sequencer.is_active() {
                Self::persist_to(&self.store, sequencer);
            }
        }
        for event in events {
            self.bus.emit(event);
        }

        let retries: Vec<AlarmRequest> = self
            .pending_alarms
            .values()
            .filter(|request| {
                !expired
                    .iter()
                    .any(|fresh| fresh.task_number == request.task_number)
            })
            .cloned()
            .collect();
        for request in retries {
            debug!(task = request.task_number, "retrying alarm");
            self.present(request);
        }
        for request in expired {
            info!(task = request.task_number, index = request.index, "subtask expired");
            self.present(request);
        }

        let view = self.registry.notification();
        self.bus.emit(Event::NotificationUpdated {
            task_number: view.as_ref().map(|v| v.task_number),
            text: view.as_ref().map(NotificationView::text),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Deliver the user's acknowledgment for task `number`.
    ///
    /// Returns `false` when the task is registered but not waiting.
    ///
    /// # Errors
    /// `NotRunning` if the task is not registered.
    pub fn acknowledge(&mut self, number: u32) -> Result<bool> {
        let sequencer = self
            .registry
            .get_mut(number)
            .ok_or(ValidationError::NotRunning { number })?;
        let SequencerState::AwaitingAck { index } = sequencer.state() else {
            debug!(task = number, "acknowledge ignored, no alarm pending");
            return Ok(false);
        };
        let Some(event) = sequencer.acknowledge() else {
            return Ok(false);
        };
        let completed = sequencer.state() == SequencerState::Completed;
        self.pending_alarms.remove(&number);
        self.bus.emit(Event::SubtaskCompleted {
            task_number: number,
            index,
            at: Utc::now(),
        });

        if completed {
            self.registry.unregister(number);
            self.progress().clear(number)?;
            self.catalog().set_running(number, false)?;
            info!(task = number, "task completed");
        } else if let Some(sequencer) = self.registry.get(number) {
            Self::persist_to(&self.store, sequencer);
            info!(task = number, index = index + 1, "next subtask started");
        }
        self.bus.emit(event);
        Ok(true)
    }

    /// Re-enter `Counting` for every stored task with persisted progress.
    ///
    /// Progress that no longer fits the task's subtask list is discarded.
    /// Returns the task numbers that were resumed.
    pub fn resume_all(&mut self) -> Result<Vec<u32>> {
        let tasks = self.catalog().load_tasks()?;
        let mut resumed = Vec::new();
        for task in tasks {
            if self.registry.contains(task.number) {
                continue;
            }
            let Some(stored) = self.progress().load(task.number)? else {
                continue;
            };
            let mut sequencer = SubtaskSequencer::new(task.number, &task.algorithm);
            let event = match sequencer.resume(stored.progress) {
                Ok(event) => event,
                Err(e) => {
                    warn!(task = task.number, error = %e, "discarding stale progress");
                    self.progress().clear(task.number)?;
                    self.catalog().set_running(task.number, false)?;
                    continue;
                }
            };
            info!(
                task = task.number,
                index = stored.progress.index,
                remaining_ms = stored.progress.remaining_ms,
                "task resumed"
            );
            self.persist(&sequencer);
            self.registry.register(sequencer)?;
            self.catalog().set_running(task.number, true)?;
            if let Some(event) = event {
                self.bus.emit(event);
            }
            resumed.push(task.number);
        }
        Ok(resumed)
    }

    /// Update a catalog algorithm and announce it.
    ///
    /// Running sequencers keep the snapshot they were started with, so their
    /// progress and running flag are written back after the catalog drops
    /// them.
    pub fn update_algorithm(
        &mut self,
        original_name: &str,
        updated: Algorithm,
    ) -> Result<AlgorithmUpdate> {
        let update = self.catalog().update_algorithm(original_name, updated)?;
        for number in self.registry.task_numbers() {
            if let Some(sequencer) = self.registry.get(number) {
                self.persist(sequencer);
            }
            self.catalog().set_running(number, true)?;
        }
        self.bus.emit(update.event());
        Ok(update)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn present(&mut self, request: AlarmRequest) {
        match self.presenter.present(&request) {
            Ok(()) => {
                self.pending_alarms.remove(&request.task_number);
            }
            Err(e) => {
                warn!(task = request.task_number, error = %e, "alarm presentation failed");
                self.bus.emit(Event::AlarmFailed {
                    task_number: request.task_number,
                    index: request.index,
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                self.pending_alarms.insert(request.task_number, request);
            }
        }
    }

    fn persist(&self, sequencer: &SubtaskSequencer) {
        Self::persist_to(&self.store, sequencer);
    }

    fn persist_to(store: &S, sequencer: &SubtaskSequencer) {
        let Some(progress) = sequencer.progress() else {
            return;
        };
        let next = sequencer.next_subtask().map(|s| s.description.as_str());
        if let Err(e) = ProgressStore::new(store).save(sequencer.task_number(), progress, next) {
            warn!(task = sequencer.task_number(), error = %e, "failed to persist progress");
        }
    }
}

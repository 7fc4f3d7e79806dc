//! Active sequencers keyed by task number.

use std::collections::BTreeMap;

use serde::Serialize;

use super::format::format_hms;
use super::sequencer::{SequencerState, SubtaskSequencer};
use crate::error::ValidationError;

/// What the shared notification shows: the soonest-expiring counting task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub task_number: u32,
    pub task_name: String,
    pub subtask: String,
    pub remaining_ms: u64,
}

impl NotificationView {
    pub fn text(&self) -> String {
        format!(
            "Task {} {}: {} - {}",
            self.task_number,
            self.task_name,
            self.subtask,
            format_hms(self.remaining_ms)
        )
    }
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: BTreeMap<u32, SubtaskSequencer>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sequencer: SubtaskSequencer) -> Result<(), ValidationError> {
        let number = sequencer.task_number();
        if self.timers.contains_key(&number) {
            return Err(ValidationError::AlreadyRunning { number });
        }
        self.timers.insert(number, sequencer);
        Ok(())
    }

    pub fn unregister(&mut self, task_number: u32) -> Option<SubtaskSequencer> {
        self.timers.remove(&task_number)
    }

    pub fn get(&self, task_number: u32) -> Option<&SubtaskSequencer> {
        self.timers.get(&task_number)
    }

    pub fn get_mut(&mut self, task_number: u32) -> Option<&mut SubtaskSequencer> {
        self.timers.get_mut(&task_number)
    }

    pub fn contains(&self, task_number: u32) -> bool {
        self.timers.contains_key(&task_number)
    }

    /// Sequencers in ascending task-number order.
    pub fn iter(&self) -> impl Iterator<Item = &SubtaskSequencer> {
        self.timers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SubtaskSequencer> {
        self.timers.values_mut()
    }

    pub fn task_numbers(&self) -> Vec<u32> {
        self.timers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Counting sequencer with the least time left; ties go to the lower
    /// task number.
    pub fn soonest_expiring(&self) -> Option<&SubtaskSequencer> {
        self.timers
            .values()
            .filter_map(|seq| match seq.state() {
                SequencerState::Counting { remaining_ms, .. } => Some((remaining_ms, seq)),
                _ => None,
            })
            .min_by_key(|(remaining_ms, seq)| (*remaining_ms, seq.task_number()))
            .map(|(_, seq)| seq)
    }

    pub fn notification(&self) -> Option<NotificationView> {
        let seq = self.soonest_expiring()?;
        Some(NotificationView {
            task_number: seq.task_number(),
            task_name: seq.algorithm_name().to_string(),
            subtask: seq
                .current_subtask()
                .map(|s| s.description.clone())
                .unwrap_or_default(),
            remaining_ms: seq.remaining_ms().unwrap_or(0),
        })
    }
}

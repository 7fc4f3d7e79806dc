//! Subtask sequencer.
//!
//! A tick-driven state machine over one task's subtask list. It has no
//! internal thread or clock; the caller invokes `tick()` with the elapsed
//! time (one second per tick by default).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Counting -> AwaitingAck -> Counting -> ... -> Completed
//!   any state -- stop --> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut seq = SubtaskSequencer::new(task.number, &task.algorithm);
//! seq.start();
//! // every second:
//! seq.tick(1000); // Some(Event::SubtaskExpired) when the countdown hits zero
//! // after the user dismisses the alarm:
//! seq.acknowledge();
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::alarm::{AlarmRequest, SubtaskSummary};
use crate::error::ValidationError;
use crate::events::Event;
use crate::model::{Algorithm, Subtask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequencerState {
    Idle,
    Counting { index: usize, remaining_ms: u64 },
    /// Countdown finished; blocked until the user acknowledges.
    AwaitingAck { index: usize },
    Completed,
}

/// The persisted `(index, remaining)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerProgress {
    pub index: usize,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSequencer {
    task_number: u32,
    algorithm_name: String,
    total_time_secs: u64,
    subtasks: Vec<Subtask>,
    state: SequencerState,
}

impl SubtaskSequencer {
    /// Create an idle sequencer over a snapshot of `algorithm`.
    pub fn new(task_number: u32, algorithm: &Algorithm) -> Self {
        Self {
            task_number,
            algorithm_name: algorithm.name.clone(),
            total_time_secs: algorithm.total_time,
            subtasks: algorithm.subtasks.clone(),
            state: SequencerState::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn task_number(&self) -> u32 {
        self.task_number
    }

    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SequencerState::Counting { index, .. } | SequencerState::AwaitingAck { index } => {
                Some(index)
            }
            _ => None,
        }
    }

    pub fn current_subtask(&self) -> Option<&Subtask> {
        self.subtasks.get(self.current_index()?)
    }

    pub fn next_subtask(&self) -> Option<&Subtask> {
        self.subtasks.get(self.current_index()? + 1)
    }

    /// Remaining milliseconds, only while counting.
    pub fn remaining_ms(&self) -> Option<u64> {
        match self.state {
            SequencerState::Counting { remaining_ms, .. } => Some(remaining_ms),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SequencerState::Counting { .. } | SequencerState::AwaitingAck { .. }
        )
    }

    /// What should be on disk right now. `None` means "no progress".
    pub fn progress(&self) -> Option<TimerProgress> {
        match self.state {
            SequencerState::Counting {
                index,
                remaining_ms,
            } => Some(TimerProgress {
                index,
                remaining_ms,
            }),
            SequencerState::AwaitingAck { index } => Some(TimerProgress {
                index,
                remaining_ms: 0,
            }),
            SequencerState::Idle | SequencerState::Completed => None,
        }
    }

    /// The alarm to show, only while awaiting acknowledgment.
    pub fn alarm_request(&self) -> Option<AlarmRequest> {
        let SequencerState::AwaitingAck { index } = self.state else {
            return None;
        };
        let completed = self.subtasks.get(index)?;
        Some(AlarmRequest {
            task_number: self.task_number,
            task_name: self.algorithm_name.clone(),
            total_time_secs: self.total_time_secs,
            index,
            completed: completed.into(),
            next: self.subtasks.get(index + 1).map(SubtaskSummary::from),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// `Idle -> Counting(0)`, or straight to `Completed` for an empty list.
    pub fn start(&mut self) -> Option<Event> {
        if self.state != SequencerState::Idle {
            return None;
        }
        Some(self.enter(0))
    }

    /// Re-enter `Counting` at a persisted point, skipping `Idle`'s start.
    ///
    /// `remaining_ms` above the subtask's duration is clamped to it.
    pub fn resume(&mut self, progress: TimerProgress) -> Result<Option<Event>, ValidationError> {
        if self.state != SequencerState::Idle {
            return Ok(None);
        }
        let Some(subtask) = self.subtasks.get(progress.index) else {
            return Err(ValidationError::OutOfBounds {
                collection: format!("task {} subtasks", self.task_number),
                index: progress.index,
                len: self.subtasks.len(),
            });
        };
        let remaining_ms = progress.remaining_ms.min(subtask.duration_ms());
        self.state = SequencerState::Counting {
            index: progress.index,
            remaining_ms,
        };
        Ok(Some(Event::SubtaskStarted {
            task_number: self.task_number,
            index: progress.index,
            description: subtask.description.clone(),
            duration_secs: subtask.duration,
            remaining_ms,
            at: Utc::now(),
        }))
    }

    /// Advance the countdown. Returns `SubtaskExpired` when it reaches zero.
    pub fn tick(&mut self, elapsed_ms: u64) -> Option<Event> {
        let SequencerState::Counting {
            index,
            remaining_ms,
        } = self.state
        else {
            return None;
        };
        let remaining_ms = remaining_ms.saturating_sub(elapsed_ms);
        if remaining_ms == 0 {
            self.state = SequencerState::AwaitingAck { index };
            return Some(Event::SubtaskExpired {
                task_number: self.task_number,
                index,
                at: Utc::now(),
            });
        }
        self.state = SequencerState::Counting {
            index,
            remaining_ms,
        };
        Some(Event::CountdownTick {
            task_number: self.task_number,
            index,
            remaining_ms,
            at: Utc::now(),
        })
    }

    /// Deliver the user's acknowledgment. Moves to the next subtask or
    /// completes; ignored in any state but `AwaitingAck`.
    pub fn acknowledge(&mut self) -> Option<Event> {
        let SequencerState::AwaitingAck { index } = self.state else {
            return None;
        };
        Some(self.enter(index + 1))
    }

    /// External cancellation. Any state goes back to `Idle`.
    pub fn stop(&mut self) -> Option<Event> {
        let was = self.state;
        self.state = SequencerState::Idle;
        if was == SequencerState::Idle {
            return None;
        }
        Some(Event::TaskStopped {
            task_number: self.task_number,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter(&mut self, index: usize) -> Event {
        match self.subtasks.get(index) {
            Some(subtask) => {
                let remaining_ms = subtask.duration_ms();
                self.state = SequencerState::Counting {
                    index,
                    remaining_ms,
                };
                Event::SubtaskStarted {
                    task_number: self.task_number,
                    index,
                    description: subtask.description.clone(),
                    duration_secs: subtask.duration,
                    remaining_ms,
                    at: Utc::now(),
                }
            }
            None => {
                self.state = SequencerState::Completed;
                Event::TaskCompleted {
                    task_number: self.task_number,
                    at: Utc::now(),
                }
            }
        }
    }
}

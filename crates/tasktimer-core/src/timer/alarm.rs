//! Alarm hand-off.
//!
//! When a subtask's countdown expires the coordinator builds an
//! [`AlarmRequest`] and passes it to an [`AlarmPresenter`]. Presentation is
//! platform specific; acknowledgment comes back separately through
//! `TaskCoordinator::acknowledge`.

use serde::{Deserialize, Serialize};

use super::format::format_hms;
use crate::error::AlarmError;
use crate::model::Subtask;

/// Vibration waveform: delay, on, off (milliseconds), repeated.
pub const VIBRATION_PATTERN_MS: [u64; 3] = [0, 500, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmTone {
    Standard,
    Urgent,
}

/// How an alarm should sound and vibrate, keyed by subtask priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmProfile {
    pub tone: AlarmTone,
    pub vibration_pattern_ms: [u64; 3],
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSummary {
    pub description: String,
    pub duration_secs: u64,
    pub high_priority: bool,
}

impl From<&Subtask> for SubtaskSummary {
    fn from(subtask: &Subtask) -> Self {
        Self {
            description: subtask.description.clone(),
            duration_secs: subtask.duration,
            high_priority: subtask.is_high_priority,
        }
    }
}

/// Everything the alarm surface shows for one expired subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub task_number: u32,
    pub task_name: String,
    pub total_time_secs: u64,
    pub index: usize,
    pub completed: SubtaskSummary,
    /// `None` when the task completes on acknowledgment.
    pub next: Option<SubtaskSummary>,
}

impl AlarmRequest {
    pub fn is_high_priority(&self) -> bool {
        self.completed.high_priority
    }

    pub fn profile(&self) -> AlarmProfile {
        AlarmProfile {
            tone: if self.is_high_priority() {
                AlarmTone::Urgent
            } else {
                AlarmTone::Standard
            },
            vibration_pattern_ms: VIBRATION_PATTERN_MS,
            looping: true,
        }
    }

    pub fn title(&self) -> String {
        format!(
            "{} {} ({})",
            self.task_number,
            self.task_name,
            format_hms(self.total_time_secs.saturating_mul(1000))
        )
    }

    /// Text lines for a plain-text surface.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.title(),
            format!(
                "Completed: {} ({})",
                self.completed.description,
                format_hms(self.completed.duration_secs.saturating_mul(1000))
            ),
        ];
        match &self.next {
            Some(next) if !next.description.is_empty() => {
                let mut line = format!("Next: {}", next.description);
                if next.duration_secs > 0 {
                    line.push_str(&format!(
                        " ({})",
                        format_hms(next.duration_secs.saturating_mul(1000))
                    ));
                }
                if next.high_priority {
                    line.push_str(" [high priority]");
                }
                lines.push(line);
            }
            Some(_) => lines.push("Next: (unnamed subtask)".to_string()),
            None => lines.push("All subtasks done!".to_string()),
        }
        if self.is_high_priority() {
            lines.push("High priority!".to_string());
        }
        lines
    }
}

/// Shows an alarm. Must not block waiting for acknowledgment.
pub trait AlarmPresenter {
    fn present(&mut self, request: &AlarmRequest) -> Result<(), AlarmError>;
}

impl<P: AlarmPresenter + ?Sized> AlarmPresenter for Box<P> {
    fn present(&mut self, request: &AlarmRequest) -> Result<(), AlarmError> {
        (**self).present(request)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One timed step of an algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub description: String,
    /// Duration in seconds.
    pub duration: u64,
    #[serde(default)]
    pub is_high_priority: bool,
}

impl Subtask {
    pub fn new(description: impl Into<String>, duration: u64) -> Self {
        Self {
            description: description.into(),
            duration,
            is_high_priority: false,
        }
    }

    pub fn high_priority(mut self) -> Self {
        self.is_high_priority = true;
        self
    }

    /// Get subtask duration in milliseconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_ms(&self) -> u64 {
        self.duration.saturating_mul(1000)
    }
}

/// A named, ordered template of subtasks.
///
/// `total_time` is a cached sum of the subtask durations. It is NOT kept in
/// sync automatically; call [`Algorithm::recompute_total_time`] after editing
/// `subtasks` directly. The constructors and the catalog do this for you.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Algorithm {
    pub name: String,
    pub subtasks: Vec<Subtask>,
    /// Total duration in seconds.
    #[serde(default)]
    pub total_time: u64,
}

impl Algorithm {
    /// Build an algorithm with a validated, trimmed name and a fresh total.
    pub fn new(name: &str, subtasks: Vec<Subtask>) -> Result<Self, ValidationError> {
        let mut algorithm = Self {
            name: name.to_string(),
            subtasks,
            total_time: 0,
        };
        algorithm.validate()?;
        algorithm.recompute_total_time();
        Ok(algorithm)
    }

    /// Trim the name and reject it if nothing is left.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        Ok(())
    }

    pub fn recompute_total_time(&mut self) {
        self.total_time = self
            .subtasks
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.duration));
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time.saturating_mul(1000)
    }

    pub fn push_subtask(&mut self, subtask: Subtask) {
        self.subtasks.push(subtask);
        self.recompute_total_time();
    }

    pub fn remove_subtask(&mut self, index: usize) -> Result<Subtask, ValidationError> {
        if index >= self.subtasks.len() {
            return Err(ValidationError::OutOfBounds {
                collection: format!("algorithm '{}'", self.name),
                index,
                len: self.subtasks.len(),
            });
        }
        let removed = self.subtasks.remove(index);
        self.recompute_total_time();
        Ok(removed)
    }
}

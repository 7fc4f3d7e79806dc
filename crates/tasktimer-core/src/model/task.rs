use serde::{Deserialize, Serialize};

use super::Algorithm;

/// A numbered instance of an algorithm.
///
/// Holds a snapshot of the algorithm taken at creation time. Catalog edits
/// reach it only through [`Task::sync_algorithm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub number: u32,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub is_running: bool,
}

impl Task {
    pub fn new(number: u32, algorithm: Algorithm) -> Self {
        Self {
            number,
            algorithm,
            is_running: false,
        }
    }

    pub fn algorithm_name(&self) -> &str {
        &self.algorithm.name
    }

    /// Total duration in seconds.
    pub fn total_time(&self) -> u64 {
        self.algorithm.total_time
    }

    /// Replace the snapshot if `updated` supersedes the algorithm named
    /// `original_name`. Returns whether anything changed.
    pub fn sync_algorithm(&mut self, original_name: &str, updated: &Algorithm) -> bool {
        if self.algorithm.name != original_name {
            return false;
        }
        self.algorithm = updated.clone();
        true
    }
}

//! Per-task timer progress under `task_{number}_*` keys.

use serde::Serialize;
use tracing::warn;

use super::database::KvStore;
use crate::error::DatabaseError;
use crate::timer::TimerProgress;

fn current_key(task_number: u32) -> String {
    format!("task_{task_number}_current")
}

fn remaining_key(task_number: u32) -> String {
    format!("task_{task_number}_remaining")
}

fn next_desc_key(task_number: u32) -> String {
    format!("task_{task_number}_next_desc")
}

/// Progress as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredProgress {
    pub task_number: u32,
    pub progress: TimerProgress,
    pub next_description: Option<String>,
}

pub struct ProgressStore<'a, S: KvStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KvStore + ?Sized> ProgressStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub fn save(
        &self,
        task_number: u32,
        progress: TimerProgress,
        next_description: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.kv
            .kv_set(&current_key(task_number), &progress.index.to_string())?;
        self.kv
            .kv_set(&remaining_key(task_number), &progress.remaining_ms.to_string())?;
        match next_description {
            Some(desc) => self.kv.kv_set(&next_desc_key(task_number), desc)?,
            None => self.kv.kv_remove(&next_desc_key(task_number))?,
        }
        Ok(())
    }

    /// Read persisted progress. Missing keys, a negative index or unparsable
    /// values all mean "no progress".
    pub fn load(&self, task_number: u32) -> Result<Option<StoredProgress>, DatabaseError> {
        let Some(current) = self.kv.kv_get(&current_key(task_number))? else {
            return Ok(None);
        };
        let index = match current.trim().parse::<i64>() {
            Ok(i) if i >= 0 => i as usize,
            Ok(_) => return Ok(None),
            Err(e) => {
                warn!(task_number, value = %current, error = %e, "ignoring unparsable progress index");
                return Ok(None);
            }
        };
        let Some(remaining) = self.kv.kv_get(&remaining_key(task_number))? else {
            warn!(task_number, "progress index without remaining time, ignoring");
            return Ok(None);
        };
        let remaining_ms = match remaining.trim().parse::<i64>() {
            Ok(ms) => ms.max(0) as u64,
            Err(e) => {
                warn!(task_number, value = %remaining, error = %e, "ignoring unparsable remaining time");
                return Ok(None);
            }
        };
        let next_description = self.kv.kv_get(&next_desc_key(task_number))?;
        Ok(Some(StoredProgress {
            task_number,
            progress: TimerProgress {
                index,
                remaining_ms,
            },
            next_description,
        }))
    }

    pub fn clear(&self, task_number: u32) -> Result<(), DatabaseError> {
        self.kv.kv_remove(&current_key(task_number))?;
        self.kv.kv_remove(&remaining_key(task_number))?;
        self.kv.kv_remove(&next_desc_key(task_number))?;
        Ok(())
    }
}

//! Data model: subtasks, algorithms and tasks.

mod algorithm;
mod task;

pub use algorithm::{Algorithm, Subtask};
pub use task::Task;

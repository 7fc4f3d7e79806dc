//! # TaskTimer Core Library
//!
//! Core logic for TaskTimer: named algorithms of timed subtasks, numbered
//! tasks bound to an algorithm snapshot, and a countdown that walks a task's
//! subtasks one at a time, raising an alarm and waiting for acknowledgment
//! after each.
//!
//! ## Architecture
//!
//! - **Sequencer**: A tick-driven state machine per running task; the caller
//!   invokes `tick()` with the elapsed time
//! - **Coordinator**: Owns the active sequencers, persists progress every
//!   tick, presents alarms and publishes events
//! - **Storage**: SQLite key-value storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SubtaskSequencer`]: Per-task countdown state machine
//! - [`TaskCoordinator`]: Drives every running task from one tick
//! - [`Catalog`]: Algorithm and task persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod model;
pub mod storage;
pub mod timer;

pub use error::{AlarmError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, EventBus, EventSubscriber};
pub use model::{Algorithm, Subtask, Task};
pub use storage::{Catalog, Config, Database, KvStore, ProgressStore};
pub use timer::{
    format_hms, AlarmPresenter, AlarmRequest, SequencerState, SubtaskSequencer, TaskCoordinator,
    TimerProgress,
};

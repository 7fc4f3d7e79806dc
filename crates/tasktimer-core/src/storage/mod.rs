mod config;
pub mod catalog;
pub mod database;
pub mod progress;

pub use catalog::{AlgorithmUpdate, Catalog};
pub use config::{AlarmConfig, Config, NotificationsConfig, TimerConfig};
pub use database::{Database, KvStore};
pub use progress::{ProgressStore, StoredProgress};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `TASKTIMER_DATA_DIR` wins when set. Otherwise `~/.config/tasktimer`, or
/// `~/.config/tasktimer-dev` when `TASKTIMER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("TASKTIMER_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TASKTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("tasktimer-dev")
            } else {
                base_dir.join("tasktimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

//! Task management commands for CLI.

use clap::Subcommand;
use tasktimer_core::storage::{Catalog, Database, ProgressStore};
use tasktimer_core::ValidationError;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a numbered task from an algorithm
    Create {
        /// Task number
        number: u32,
        /// Algorithm name
        algorithm: String,
    },
    /// List tasks
    List,
    /// Show a task and its saved progress
    Show {
        /// Task number
        number: u32,
    },
    /// Delete a task
    Delete {
        /// Task number
        number: u32,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let catalog = Catalog::new(&db);

    match action {
        TaskAction::Create { number, algorithm } => {
            let task = catalog.create_task(number, &algorithm)?;
            println!("Task created: {}", task.number);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List => {
            let tasks = catalog.load_tasks()?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Show { number } => {
            let task = catalog
                .find_task(number)?
                .ok_or(ValidationError::UnknownTask { number })?;
            let progress = ProgressStore::new(&db).load(number)?;
            let json = serde_json::json!({
                "task": task,
                "progress": progress,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        TaskAction::Delete { number } => {
            if !catalog.delete_task(number)? {
                return Err(ValidationError::UnknownTask { number }.into());
            }
            println!("Task deleted: {number}");
        }
    }
    Ok(())
}

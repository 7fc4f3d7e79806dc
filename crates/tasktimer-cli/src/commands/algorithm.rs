//! Algorithm catalog commands for CLI.

use clap::Subcommand;
use tasktimer_core::storage::{Catalog, Database};
use tasktimer_core::{Algorithm, Subtask, ValidationError};

#[derive(Subcommand)]
pub enum AlgorithmAction {
    /// Create a new algorithm
    Create {
        /// Algorithm name
        name: String,
        /// Subtask as "description:seconds" or "description:seconds:high" (repeatable)
        #[arg(long = "subtask", value_parser = parse_subtask)]
        subtasks: Vec<Subtask>,
    },
    /// List all algorithms
    List,
    /// Show one algorithm
    Show {
        /// Algorithm name
        name: String,
    },
    /// Rename an algorithm or replace its subtasks
    Edit {
        /// Current algorithm name
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// Replacement subtask list (repeatable)
        #[arg(long = "subtask", value_parser = parse_subtask)]
        subtasks: Vec<Subtask>,
    },
    /// Append a subtask
    AddSubtask {
        /// Algorithm name
        name: String,
        /// Subtask description
        description: String,
        /// Duration in seconds
        seconds: u64,
        /// Mark as high priority
        #[arg(long)]
        high: bool,
    },
    /// Remove the subtask at a zero-based index
    RemoveSubtask {
        /// Algorithm name
        name: String,
        /// Subtask index
        index: usize,
    },
    /// Delete an algorithm (tasks keep their snapshot)
    Delete {
        /// Algorithm name
        name: String,
    },
}

/// Parse `description:seconds[:high]`. The description may itself contain
/// colons.
pub fn parse_subtask(raw: &str) -> Result<Subtask, String> {
    let (rest, high) = match raw.strip_suffix(":high") {
        Some(rest) => (rest, true),
        None => (raw, false),
    };
    let (description, seconds) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("expected description:seconds, got '{raw}'"))?;
    let seconds: u64 = seconds
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{seconds}' in '{raw}'"))?;
    let subtask = Subtask::new(description.trim(), seconds);
    Ok(if high { subtask.high_priority() } else { subtask })
}

fn require(catalog: &Catalog<'_, Database>, name: &str) -> Result<Algorithm, Box<dyn std::error::Error>> {
    catalog.find_algorithm(name)?.ok_or_else(|| {
        ValidationError::UnknownAlgorithm {
            name: name.to_string(),
        }
        .into()
    })
}

pub fn run(action: AlgorithmAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let catalog = Catalog::new(&db);

    match action {
        AlgorithmAction::Create { name, subtasks } => {
            let algorithm = catalog.add_algorithm(Algorithm::new(&name, subtasks)?)?;
            println!("Algorithm created: {}", algorithm.name);
            println!("{}", serde_json::to_string_pretty(&algorithm)?);
        }
        AlgorithmAction::List => {
            let algorithms = catalog.load_algorithms()?;
            println!("{}", serde_json::to_string_pretty(&algorithms)?);
        }
        AlgorithmAction::Show { name } => {
            let algorithm = require(&catalog, &name)?;
            println!("{}", serde_json::to_string_pretty(&algorithm)?);
        }
        AlgorithmAction::Edit {
            name,
            rename,
            subtasks,
        } => {
            let mut algorithm = require(&catalog, &name)?;
            if let Some(new_name) = rename {
                algorithm.name = new_name;
            }
            if !subtasks.is_empty() {
                algorithm.subtasks = subtasks;
            }
            let update = catalog.update_algorithm(&name, algorithm)?;
            println!(
                "Algorithm updated: {} ({} tasks synced)",
                update.algorithm.name, update.tasks_synced
            );
        }
        AlgorithmAction::AddSubtask {
            name,
            description,
            seconds,
            high,
        } => {
            let mut algorithm = require(&catalog, &name)?;
            let subtask = Subtask::new(description, seconds);
            algorithm.push_subtask(if high { subtask.high_priority() } else { subtask });
            let update = catalog.update_algorithm(&name, algorithm)?;
            println!(
                "Subtask added to {} ({} subtasks)",
                update.algorithm.name,
                update.algorithm.subtasks.len()
            );
        }
        AlgorithmAction::RemoveSubtask { name, index } => {
            let mut algorithm = require(&catalog, &name)?;
            let removed = algorithm.remove_subtask(index)?;
            catalog.update_algorithm(&name, algorithm)?;
            println!("Subtask removed: {}", removed.description);
        }
        AlgorithmAction::Delete { name } => {
            if !catalog.delete_algorithm(&name)? {
                return Err(ValidationError::UnknownAlgorithm { name }.into());
            }
            println!("Algorithm deleted: {name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_subtask() {
        let s = parse_subtask("Warm up:60").unwrap();
        assert_eq!(s.description, "Warm up");
        assert_eq!(s.duration, 60);
        assert!(!s.is_high_priority);
    }

    #[test]
    fn parse_high_priority_subtask_with_colon_in_description() {
        let s = parse_subtask("Step 1: mix:30:high").unwrap();
        assert_eq!(s.description, "Step 1: mix");
        assert_eq!(s.duration, 30);
        assert!(s.is_high_priority);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(parse_subtask("no duration").is_err());
        assert!(parse_subtask("bad:abc").is_err());
        assert!(parse_subtask("neg:-5").is_err());
    }
}

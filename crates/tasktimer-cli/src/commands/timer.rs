//! Timer commands for CLI.
//!
//! `timer run` keeps the process in the foreground: it ticks every running
//! task, prints events as JSON lines on stdout and reads commands from
//! stdin. Alarms are written to stderr.

use std::io::Write;
use std::time::Duration;

use clap::Subcommand;
use serde_json::json;
use tasktimer_core::storage::{AlarmConfig, Catalog, Database, ProgressStore};
use tasktimer_core::timer::{AlarmPresenter, AlarmRequest, AlarmTone, TaskCoordinator};
use tasktimer_core::{format_hms, AlarmError, Config, Event, EventSubscriber, ValidationError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

type Coordinator = TaskCoordinator<Database, TerminalAlarm>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run timers in the foreground until no task is active
    ///
    /// Reads `ack <n>`, `stop <n>`, `status` and `quit` from stdin.
    Run {
        /// Task number to start (repeatable)
        #[arg(long = "start")]
        start: Vec<u32>,
        /// Also print per-tick countdown and notification events
        #[arg(long)]
        ticks: bool,
    },
    /// Stop a task and clear its saved progress
    Stop {
        /// Task number
        number: u32,
    },
    /// Print saved progress of every task as JSON
    Status,
}

/// Alarm surface for a terminal: bell characters and text on stderr.
pub struct TerminalAlarm {
    sound: bool,
    vibration: bool,
    volume: u32,
    high_priority_repeats: u32,
}

impl TerminalAlarm {
    pub fn from_config(config: &AlarmConfig) -> Self {
        Self {
            sound: config.sound,
            vibration: config.vibration,
            volume: config.volume,
            high_priority_repeats: config.high_priority_repeats,
        }
    }

    /// Bell characters for one alarm: the volume level, repeated for urgent tones.
    fn bell_count(&self, tone: AlarmTone) -> usize {
        if !self.sound {
            return 0;
        }
        let repeats = match tone {
            AlarmTone::Urgent => self.high_priority_repeats.max(1),
            AlarmTone::Standard => 1,
        };
        self.volume.saturating_mul(repeats) as usize
    }
}

impl AlarmPresenter for TerminalAlarm {
    fn present(&mut self, request: &AlarmRequest) -> Result<(), AlarmError> {
        let profile = request.profile();
        let mut out = std::io::stderr().lock();
        let bells = self.bell_count(profile.tone);
        if bells > 0 {
            write!(out, "{}", "\x07".repeat(bells))?;
        }
        writeln!(out, "*** ALARM ***")?;
        for line in request.lines() {
            writeln!(out, "  {line}")?;
        }
        if self.vibration {
            writeln!(out, "  (vibrate {:?} ms)", profile.vibration_pattern_ms)?;
        }
        writeln!(out, "  Type 'ack {}' to continue", request.task_number)?;
        out.flush()?;
        Ok(())
    }
}

/// A line typed on stdin during `timer run`.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ack(u32),
    Stop(u32),
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let number = |arg: Option<&str>| -> Result<u32, String> {
        let arg = arg.ok_or_else(|| format!("'{verb}' needs a task number"))?;
        arg.parse()
            .map_err(|_| format!("invalid task number '{arg}'"))
    };
    let command = match verb {
        "ack" | "a" => Command::Ack(number(words.next())?),
        "stop" | "s" => Command::Stop(number(words.next())?),
        "status" => Command::Status,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    if words.next().is_some() {
        return Err(format!("too many arguments to '{verb}'"));
    }
    Ok(command)
}

#[derive(Clone, Copy)]
struct EventFilter {
    ticks: bool,
    notifications: bool,
}

impl EventFilter {
    fn shows(&self, event: &Event) -> bool {
        match event {
            Event::CountdownTick { .. } => self.ticks,
            Event::NotificationUpdated { .. } => self.ticks && self.notifications,
            _ => true,
        }
    }
}

fn print_events(
    events: &mut EventSubscriber,
    filter: EventFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    for event in events.drain() {
        if filter.shows(&event) {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

fn print_status(coordinator: &Coordinator) -> Result<(), Box<dyn std::error::Error>> {
    let timers: Vec<_> = coordinator
        .registry()
        .iter()
        .map(|seq| {
            json!({
                "task_number": seq.task_number(),
                "algorithm": seq.algorithm_name(),
                "subtask": seq.current_subtask().map(|s| s.description.as_str()),
                "state": seq.state(),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string(&json!({ "type": "Status", "timers": timers }))?
    );
    Ok(())
}

/// Returns `false` when the loop should end.
fn handle_line(coordinator: &mut Coordinator, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
    if line.trim().is_empty() {
        return Ok(true);
    }
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {message}");
            return Ok(true);
        }
    };
    let outcome = match command {
        Command::Ack(number) => coordinator.acknowledge(number).map(|applied| {
            if !applied {
                eprintln!("task {number} has no pending alarm");
            }
        }),
        Command::Stop(number) => coordinator.stop_task(number).map(|_| ()),
        Command::Status => {
            print_status(coordinator)?;
            Ok(())
        }
        Command::Quit => {
            info!("quitting; progress is kept for the next run");
            return Ok(false);
        }
    };
    if let Err(e) = outcome {
        eprintln!("error: {e}");
    }
    Ok(true)
}

async fn drive(
    coordinator: &mut Coordinator,
    events: &mut EventSubscriber,
    tick_ms: u64,
    filter: EventFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                coordinator.tick(tick_ms)?;
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !handle_line(coordinator, &line)? {
                            print_events(events, filter)?;
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }
        }
        print_events(events, filter)?;
        if coordinator.is_idle() {
            return Ok(());
        }
    }
}

fn run_foreground(start: Vec<u32>, ticks: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let filter = EventFilter {
        ticks,
        notifications: config.notifications.enabled,
    };

    let mut coordinator = TaskCoordinator::new(db, TerminalAlarm::from_config(&config.alarm));
    let mut events = coordinator.subscribe();

    let resumed = coordinator.resume_all()?;
    if !resumed.is_empty() {
        info!(tasks = ?resumed, "resumed saved progress");
    }
    for number in start {
        if resumed.contains(&number) {
            warn!(task = number, "task already resumed from saved progress");
            continue;
        }
        coordinator.start_task(number)?;
    }
    print_events(&mut events, filter)?;
    if coordinator.is_idle() {
        eprintln!("no running tasks");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(drive(
        &mut coordinator,
        &mut events,
        config.timer.tick_interval_ms,
        filter,
    ))
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run { start, ticks } => run_foreground(start, ticks)?,
        TimerAction::Stop { number } => {
            let db = Database::open()?;
            let alarm = TerminalAlarm::from_config(&AlarmConfig::default());
            let mut coordinator = TaskCoordinator::new(db, alarm);
            if coordinator.catalog().find_task(number)?.is_none() {
                return Err(ValidationError::UnknownTask { number }.into());
            }
            coordinator.stop_task(number)?;
            println!("Task stopped: {number}");
        }
        TimerAction::Status => {
            let db = Database::open()?;
            let progress = ProgressStore::new(&db);
            let mut entries = Vec::new();
            for task in Catalog::new(&db).load_tasks()? {
                let Some(stored) = progress.load(task.number)? else {
                    continue;
                };
                let subtask = task
                    .algorithm
                    .subtasks
                    .get(stored.progress.index)
                    .map(|s| s.description.clone());
                entries.push(json!({
                    "task_number": task.number,
                    "algorithm": task.algorithm.name,
                    "subtask": subtask,
                    "index": stored.progress.index,
                    "remaining_ms": stored.progress.remaining_ms,
                    "remaining": format_hms(stored.progress.remaining_ms),
                    "next_description": stored.next_description,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

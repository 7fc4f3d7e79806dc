//! Typed events and the in-process event bus.
//!
//! Every state change in the system produces an [`Event`]. The bus uses
//! [`tokio::sync::broadcast`] for fan-out; emitting with nobody listening is
//! fine.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TaskStarted {
        task_number: u32,
        subtask_count: usize,
        at: DateTime<Utc>,
    },
    SubtaskStarted {
        task_number: u32,
        index: usize,
        description: String,
        duration_secs: u64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CountdownTick {
        task_number: u32,
        index: usize,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Countdown hit zero; the task now waits for acknowledgment.
    SubtaskExpired {
        task_number: u32,
        index: usize,
        at: DateTime<Utc>,
    },
    /// The alarm for an expired subtask could not be shown. It is retried on
    /// the next tick.
    AlarmFailed {
        task_number: u32,
        index: usize,
        reason: String,
        at: DateTime<Utc>,
    },
    /// User acknowledged an expired subtask.
    SubtaskCompleted {
        task_number: u32,
        index: usize,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_number: u32,
        at: DateTime<Utc>,
    },
    TaskStopped {
        task_number: u32,
        at: DateTime<Utc>,
    },
    /// The shared notification now shows this task (or nothing).
    NotificationUpdated {
        task_number: Option<u32>,
        text: Option<String>,
        at: DateTime<Utc>,
    },
    /// A catalog algorithm changed and task snapshots were resynchronized.
    AlgorithmUpdated {
        name: String,
        previous_name: String,
        tasks_synced: usize,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn task_number(&self) -> Option<u32> {
        match self {
            Event::TaskStarted { task_number, .. }
            | Event::SubtaskStarted { task_number, .. }
            | Event::CountdownTick { task_number, .. }
            | Event::SubtaskExpired { task_number, .. }
            | Event::AlarmFailed { task_number, .. }
            | Event::SubtaskCompleted { task_number, .. }
            | Event::TaskCompleted { task_number, .. }
            | Event::TaskStopped { task_number, .. } => Some(*task_number),
            Event::NotificationUpdated { task_number, .. } => *task_number,
            Event::AlgorithmUpdated { .. } => None,
        }
    }
}

/// Broadcast-based event bus.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// Lagging subscribers lose the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    pub fn emit(&self, event: Event) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription handle for the [`EventBus`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<Event>,
}

impl EventSubscriber {
    /// Receive the next event, skipping over any lag.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(Event::TaskStopped {
            task_number: 1,
            at: Utc::now(),
        });
        assert_eq!(bus.total_emitted(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_receives_in_order() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        bus.emit(Event::TaskStarted {
            task_number: 2,
            subtask_count: 3,
            at: Utc::now(),
        });
        bus.emit(Event::TaskCompleted {
            task_number: 2,
            at: Utc::now(),
        });

        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::TaskStarted { task_number: 2, .. }));
        assert!(matches!(events[1], Event::TaskCompleted { task_number: 2, .. }));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn lagging_subscriber_skips_to_newest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for n in 0..5 {
            bus.emit(Event::TaskStopped {
                task_number: n,
                at: Utc::now(),
            });
        }
        let numbers: Vec<_> = sub.drain().iter().filter_map(Event::task_number).collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Event::AlgorithmUpdated {
            name: "A".into(),
            previous_name: "A".into(),
            tasks_synced: 2,
            at: Utc::now(),
        })
        .unwrap();
        assert_eq!(json["type"], "AlgorithmUpdated");
        assert_eq!(json["tasks_synced"], 2);
    }

    #[tokio::test]
    async fn async_recv_returns_none_after_bus_dropped() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe();
        bus.emit(Event::TaskCompleted {
            task_number: 9,
            at: Utc::now(),
        });
        drop(bus);
        assert!(matches!(sub.recv().await, Some(Event::TaskCompleted { task_number: 9, .. })));
        assert!(sub.recv().await.is_none());
    }
}

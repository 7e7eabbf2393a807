// Supervisor event bus: every supervisor publishes into one broadcast channel
// owned by the manager; consumers subscribe independently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

use crate::supervisor::SupervisorStatus;

/// Something that happened to a supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    StatusChanged {
        from: SupervisorStatus,
        to: SupervisorStatus,
    },
    GameStarted {
        game: u32,
    },
    RunStarted {
        run: String,
    },
    RunFinished {
        run: String,
        duration: Duration,
    },
    RunFailed {
        run: String,
        reason: String,
    },
    ItemDropped {
        name: String,
        quality: String,
    },
    Error {
        reason: String,
    },
    Restarting {
        attempt: u32,
    },
}

/// Complete event envelope
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub supervisor: String,
    /// Sequence number relative to the supervisor
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
    pub event: SupervisorEvent,
}

/// Publishing handle bound to one supervisor
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<EventEnvelope>,
    supervisor: String,
    sequence: Arc<AtomicU64>,
}

impl EventSender {
    pub fn publish(&self, event: SupervisorEvent) {
        let envelope = EventEnvelope {
            supervisor: self.supervisor.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Local::now(),
            event,
        };
        // No subscribers is fine
        let _ = self.sender.send(envelope);
    }

    pub fn supervisor(&self) -> &str {
        &self.supervisor
    }
}

/// Central event bus that manages event distribution
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn sender(&self, supervisor: impl Into<String>) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            supervisor: supervisor.into(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_is_per_supervisor() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let a = bus.sender("a");
        let b = bus.sender("b");

        a.publish(SupervisorEvent::GameStarted { game: 1 });
        b.publish(SupervisorEvent::GameStarted { game: 1 });
        a.publish(SupervisorEvent::GameStarted { game: 2 });

        let seqs: Vec<(String, u64)> = (0..3)
            .map(|_| {
                let e = rx.try_recv().unwrap();
                (e.supervisor, e.sequence)
            })
            .collect();
        assert_eq!(
            seqs,
            vec![("a".into(), 0), ("b".into(), 0), ("a".into(), 1)]
        );
    }
}

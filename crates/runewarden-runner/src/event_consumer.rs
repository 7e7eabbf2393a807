use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::event_bus::{EventBus, EventEnvelope, SupervisorEvent};

/// Receives every event published on the bus
pub trait EventConsumer: Send {
    fn handle_event(&mut self, envelope: EventEnvelope);
}

/// Event consumer that logs events to the console
#[derive(Debug, Default)]
pub struct LoggingConsumer;

impl EventConsumer for LoggingConsumer {
    fn handle_event(&mut self, envelope: EventEnvelope) {
        let who = envelope.supervisor;
        match envelope.event {
            SupervisorEvent::StatusChanged { from, to } => {
                info!(target: "events", "[{}] STATUS: {} -> {}", who, from, to);
            }
            SupervisorEvent::GameStarted { game } => {
                info!(target: "events", "[{}] Game #{} started", who, game);
            }
            SupervisorEvent::RunStarted { run } => {
                info!(target: "events", "[{}] Run {} started", who, run);
            }
            SupervisorEvent::RunFinished { run, duration } => {
                info!(target: "events", "[{}] Run {} finished in {:.1}s", who, run, duration.as_secs_f64());
            }
            SupervisorEvent::RunFailed { run, reason } => {
                warn!(target: "events", "[{}] Run {} failed: {}", who, run, reason);
            }
            SupervisorEvent::ItemDropped { name, quality } => {
                info!(target: "events", "[{}] Picked up {} ({})", who, name, quality);
            }
            SupervisorEvent::Error { reason } => {
                error!(target: "events", "[{}] ERROR: {}", who, reason);
            }
            SupervisorEvent::Restarting { attempt } => {
                warn!(target: "events", "[{}] Restarting (attempt {})", who, attempt);
            }
        }
    }
}

/// Feed `consumer` from the bus until shutdown or until the bus closes
pub fn spawn_consumer(
    bus: &EventBus,
    mut consumer: Box<dyn EventConsumer>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(envelope) => consumer.handle_event(envelope),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "events", "Event consumer lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

use crate::arbiter::{InputArbiter, InputLease, Priority, SessionId};
use crate::error::{EngineError, EngineResult};
use crate::io::{GameStateSource, InputDevice, Pathfinder};
use crate::snapshot::{ItemQuality, WorldState};

/// External collaborators bound to one client process
#[derive(Clone)]
pub struct SessionBackend {
    pub game: Arc<dyn GameStateSource>,
    pub input: Arc<dyn InputDevice>,
    pub pathfinder: Arc<dyn Pathfinder>,
}

/// Pause/stop switches of a session, held by its supervisor.
///
/// The execution context only observes these; suspension points react to
/// changes without polling.
pub struct SessionControl {
    priority: watch::Sender<Priority>,
    stop: watch::Sender<bool>,
    base_priority: Priority,
}

impl SessionControl {
    pub fn new(base_priority: Priority) -> Self {
        let (priority, _) = watch::channel(base_priority);
        let (stop, _) = watch::channel(false);
        Self {
            priority,
            stop,
            base_priority,
        }
    }

    pub fn priority(&self) -> Priority {
        *self.priority.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.priority().is_paused()
    }

    pub fn pause(&self) {
        self.priority.send_replace(Priority::PAUSED);
    }

    pub fn resume(&self) {
        self.priority.send_replace(self.base_priority);
    }

    /// Flip between paused and the base priority, returning whether the
    /// session is now paused
    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume();
            false
        } else {
            self.pause();
            true
        }
    }

    pub fn request_stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Clear the stop flag before a restart
    pub fn reset(&self) {
        self.stop.send_replace(false);
        self.priority.send_replace(self.base_priority);
    }

    fn subscribe(&self) -> (watch::Receiver<Priority>, watch::Receiver<bool>) {
        (self.priority.subscribe(), self.stop.subscribe())
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new(Priority::NORMAL)
    }
}

/// Item picked up during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedItem {
    pub name: String,
    pub quality: ItemQuality,
}

/// Notifications a session sends back to its supervisor
#[derive(Debug, Clone)]
pub enum ContextEvent {
    ItemPicked(PickedItem),
}

/// Last executed action and step, for stuck reports and debugging
#[derive(Debug, Clone, Default)]
pub struct ContextDebug {
    pub last_action: String,
    pub last_step: String,
}

/// Per-session handle threaded through every step and action.
///
/// Exclusively owned by one supervisor's loop.
pub struct ExecutionContext {
    session: SessionId,
    name: String,
    backend: SessionBackend,
    arbiter: Arc<InputArbiter>,
    priority_rx: watch::Receiver<Priority>,
    stop_rx: watch::Receiver<bool>,
    events: Option<mpsc::UnboundedSender<ContextEvent>>,
    data: WorldState,
    /// Time spent blocked on pause or on the input arbiter
    suspended: Duration,
    pub debug: ContextDebug,
}

impl ExecutionContext {
    pub fn new(
        session: SessionId,
        name: impl Into<String>,
        backend: SessionBackend,
        arbiter: Arc<InputArbiter>,
        control: &SessionControl,
    ) -> Self {
        let (priority_rx, stop_rx) = control.subscribe();
        let data = backend.game.snapshot();
        Self {
            session,
            name: name.into(),
            backend,
            arbiter,
            priority_rx,
            stop_rx,
            events: None,
            data,
            suspended: Duration::ZERO,
            debug: ContextDebug::default(),
        }
    }

    /// Route context events (picked items) to a supervisor
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ContextEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot captured by the last [`refresh_game_data`](Self::refresh_game_data)
    pub fn data(&self) -> &WorldState {
        &self.data
    }

    pub fn game(&self) -> &dyn GameStateSource {
        self.backend.game.as_ref()
    }

    pub fn pathfinder(&self) -> &dyn Pathfinder {
        self.backend.pathfinder.as_ref()
    }

    /// Re-pull the world snapshot, the point where the bot notices changes
    pub fn refresh_game_data(&mut self) -> &WorldState {
        self.data = self.backend.game.snapshot();
        &self.data
    }

    pub fn priority(&self) -> Priority {
        *self.priority_rx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.priority().is_paused()
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Total time this session spent suspended while paused or waiting for
    /// the input device
    pub fn suspended(&self) -> Duration {
        self.suspended
    }

    pub fn check_stop(&self) -> EngineResult<()> {
        if self.is_stop_requested() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Block while the session is paused.
    ///
    /// A stop request while paused resolves to [`EngineError::Cancelled`].
    pub async fn wait_while_paused(&mut self) -> EngineResult<()> {
        let mut logged = false;
        let blocked_at = Instant::now();
        while self.is_paused() {
            if self.is_stop_requested() {
                return Err(EngineError::Cancelled);
            }
            if !logged {
                debug!(target: "engine", "[{}] paused", self.name);
                logged = true;
            }
            tokio::select! {
                changed = self.priority_rx.changed() => {
                    if changed.is_err() {
                        return Err(EngineError::Cancelled);
                    }
                }
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        return Err(EngineError::Cancelled);
                    }
                }
            }
        }
        if logged {
            self.suspended += blocked_at.elapsed();
            // Stopping releases the pause; the interrupted input is not issued
            if self.is_stop_requested() {
                return Err(EngineError::Cancelled);
            }
            debug!(target: "engine", "[{}] resumed", self.name);
        }
        Ok(())
    }

    /// Stop check plus pause wait; called once per interpreter tick
    pub async fn checkpoint(&mut self) -> EngineResult<()> {
        self.check_stop()?;
        self.wait_while_paused().await
    }

    /// Cooperative suspension point in front of every physical input.
    ///
    /// Blocks while the session is paused or another session owns the
    /// input device, then returns exclusive access to this session's device.
    pub async fn pause_if_not_priority(&mut self) -> EngineResult<InputLease> {
        loop {
            self.wait_while_paused().await?;
            let queued_at = Instant::now();
            let grant = self
                .arbiter
                .acquire(self.session, &self.name, self.priority())
                .await;
            self.suspended += queued_at.elapsed();
            // Paused while queued: hand the device back and wait again
            if self.is_paused() {
                drop(grant);
                continue;
            }
            return Ok(InputLease::new(grant, self.backend.input.clone()));
        }
    }

    /// Sleep that wakes early with [`EngineError::Cancelled`] on stop
    pub async fn sleep(&mut self, duration: Duration) -> EngineResult<()> {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            self.check_stop()?;
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        return Err(EngineError::Cancelled);
                    }
                }
            }
        }
    }

    /// Best-effort notification to the owning supervisor
    pub fn emit(&self, event: ContextEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

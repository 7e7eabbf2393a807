//! One automated session bound to one client process.
//!
//! A supervisor launches its client, waits for a ready screen and then drives
//! the run loop in its own task: enter a game, play every configured run,
//! leave the game, repeat. Status changes and run results are published on
//! the event bus.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use runewarden_engine::{
    Budget, ContextEvent, EngineError, ExecutionContext, InputArbiter, Interpreter, SessionControl,
    SessionId,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{CharacterConfig, ConfigLoadError, RunewardenConfig};
use crate::event_bus::{EventSender, SupervisorEvent};
use crate::game_manager::{GameError, GameManager};
use crate::launcher::{launch_args, ClientLauncher, ClientProcess, LaunchError};
use crate::scripts::{build_character, build_runs, run_chain};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorStatus {
    NotStarted,
    Starting,
    InGame,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl SupervisorStatus {
    /// Whether a client is (being) driven in this status
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::InGame | Self::Paused | Self::Stopping
        )
    }

    pub fn can_transition_to(self, to: SupervisorStatus) -> bool {
        use SupervisorStatus::*;
        match (self, to) {
            (NotStarted | Stopped | Error, Starting) => true,
            (Starting, InGame) => true,
            (InGame, Paused) | (Paused, InGame) => true,
            (Starting | InGame | Paused | Error, Stopping) => true,
            (Stopping | Error, Stopped) => true,
            (Starting | InGame | Paused | Stopping, Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SupervisorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::InGame => "in game",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("start of {name} refused: {reason}")]
    StartRefused { name: String, reason: String },
    #[error("unknown supervisor {0}")]
    UnknownSupervisor(String),
    #[error("supervisor {0} is already running")]
    AlreadyRunning(String),
    #[error("supervisor {0} is not running")]
    NotRunning(String),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("client did not reach a ready screen within {0:?}")]
    ReadyTimeout(Duration),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
}

impl SupervisorError {
    /// The loop ended because a stop was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Engine(EngineError::Cancelled) | Self::Game(GameError::Engine(EngineError::Cancelled))
        )
    }
}

/// Item picked up by a supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedItem {
    pub name: String,
    pub quality: String,
    pub at: DateTime<Local>,
}

#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    pub drops: Vec<DroppedItem>,
    pub errors: u32,
    pub games: u32,
    pub runs_completed: u32,
    pub runs_failed: u32,
    pub restarts: u32,
    pub last_error: Option<String>,
    pub current_run: Option<String>,
    pub started_at: Option<DateTime<Local>>,
}

/// Timeouts and budgets shared by every supervisor of a manager
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub ready_timeout: Duration,
    pub stop_timeout: Duration,
    pub launch_settle: Duration,
    pub budget: Budget,
}

impl SupervisorSettings {
    pub fn from_config(config: &RunewardenConfig) -> Self {
        Self {
            ready_timeout: config.client.ready_timeout(),
            stop_timeout: config.client.stop_timeout(),
            launch_settle: config.client.launch_settle(),
            budget: config.engine.budget(),
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&RunewardenConfig::default())
    }
}

/// Resources every supervisor of a manager shares
#[derive(Clone)]
pub struct SharedResources {
    pub launcher: Arc<dyn ClientLauncher>,
    pub arbiter: Arc<InputArbiter>,
    /// Held for the whole launch sequence; one launch at a time system-wide
    pub launch_gate: Arc<tokio::sync::Mutex<()>>,
}

pub struct Supervisor {
    name: String,
    session: SessionId,
    config: Arc<CharacterConfig>,
    settings: SupervisorSettings,
    shared: SharedResources,
    events: EventSender,
    control: SessionControl,
    status: Mutex<SupervisorStatus>,
    stats: Mutex<SupervisorStats>,
    process: Mutex<Option<ClientProcess>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Supervisor {
    pub fn new(
        name: impl Into<String>,
        session: SessionId,
        config: Arc<CharacterConfig>,
        settings: SupervisorSettings,
        shared: SharedResources,
        events: EventSender,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            config,
            settings,
            shared,
            events,
            control: SessionControl::default(),
            status: Mutex::new(SupervisorStatus::NotStarted),
            stats: Mutex::new(SupervisorStats::default()),
            process: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn status(&self) -> SupervisorStatus {
        *lock(&self.status)
    }

    pub fn stats(&self) -> SupervisorStats {
        lock(&self.stats).clone()
    }

    /// Move to `to` if the state machine allows it, publishing the change
    pub(crate) fn set_status(&self, to: SupervisorStatus) -> bool {
        let from = {
            let mut status = lock(&self.status);
            let from = *status;
            if from == to {
                return true;
            }
            if !from.can_transition_to(to) {
                debug!(target: "supervisor", "[{}] Ignoring transition {} -> {}", self.name, from, to);
                return false;
            }
            *status = to;
            from
        };
        debug!(target: "supervisor", "[{}] {} -> {}", self.name, from, to);
        self.events.publish(SupervisorEvent::StatusChanged { from, to });
        true
    }

    /// Launch the client, wait for it to be ready and spawn the run loop.
    ///
    /// The status must already be `Starting`; the manager sets it under its
    /// registry lock so concurrent starts observe it.
    pub async fn start(self: &Arc<Self>) -> Result<(), SupervisorError> {
        info!(target: "supervisor", "[{}] Starting supervisor", self.name);
        lock(&self.stats).started_at = Some(Local::now());

        let process = match self.launch().await {
            Ok(process) => process,
            Err(e) => {
                if !e.is_cancelled() {
                    self.fail(&e);
                }
                return Err(e);
            }
        };
        let ctx = self.context(&process);

        // Stopped while the client was starting
        if !self.set_status(SupervisorStatus::InGame) {
            self.terminate_client().await;
            return Err(SupervisorError::NotRunning(self.name.clone()));
        }

        let span = info_span!("supervisor", name = %self.name);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.supervise(ctx).await }.instrument(span));
        *lock(&self.task) = Some(handle);
        info!(target: "supervisor", "[{}] Supervisor started", self.name);
        Ok(())
    }

    async fn launch(&self) -> Result<ClientProcess, SupervisorError> {
        let launcher = &self.shared.launcher;
        let _gate = self.shared.launch_gate.lock().await;

        launcher.kill_stray_handles().await?;
        let process = launcher.launch(&self.name, &launch_args(&self.config)).await?;
        launcher.kill_stray_handles().await?;
        tokio::time::sleep(self.settings.launch_settle).await;

        if let Err(e) = self.wait_until_ready(&process).await {
            if let Err(terminate) = launcher.terminate(&process).await {
                warn!(target: "supervisor", "[{}] {}", self.name, terminate);
            }
            return Err(e);
        }
        *lock(&self.process) = Some(process.clone());
        Ok(process)
    }

    async fn wait_until_ready(&self, process: &ClientProcess) -> Result<(), SupervisorError> {
        let game = &process.backend.game;
        let deadline = Instant::now() + self.settings.ready_timeout;
        loop {
            if self.control.is_stop_requested() {
                return Err(EngineError::Cancelled.into());
            }
            if !game.process_alive() {
                return Err(EngineError::ProcessFailure("client exited while starting".into()).into());
            }
            if game.in_game() || game.is_in_character_selection_screen() {
                debug!(target: "supervisor", "[{}] Client ready", self.name);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SupervisorError::ReadyTimeout(self.settings.ready_timeout));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Fresh execution context on `process`, with picked items routed to the stats
    fn context(self: &Arc<Self>, process: &ClientProcess) -> ExecutionContext {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ContextEvent::ItemPicked(item) => this.record_drop(item.name, item.quality.to_string()),
                }
            }
        });
        ExecutionContext::new(
            self.session,
            self.name.clone(),
            process.backend.clone(),
            self.shared.arbiter.clone(),
            &self.control,
        )
        .with_events(tx)
    }

    fn record_drop(&self, name: String, quality: String) {
        lock(&self.stats).drops.push(DroppedItem {
            name: name.clone(),
            quality: quality.clone(),
            at: Local::now(),
        });
        self.events.publish(SupervisorEvent::ItemDropped { name, quality });
    }

    fn record_error(&self, reason: String) {
        {
            let mut stats = lock(&self.stats);
            stats.errors += 1;
            stats.last_error = Some(reason.clone());
        }
        self.events.publish(SupervisorEvent::Error { reason });
    }

    /// Record an unrecoverable failure and enter `Error` unless stopping
    fn fail(&self, e: &SupervisorError) {
        error!(target: "supervisor", "[{}] {}", self.name, e);
        self.record_error(e.to_string());
        if !self.control.is_stop_requested() {
            self.set_status(SupervisorStatus::Error);
        }
    }

    /// Body of the supervisor task: run loop plus restart policy
    async fn supervise(self: Arc<Self>, mut ctx: ExecutionContext) {
        let mut games = GameManager::new(self.config.difficulty, self.config.companion.clone());
        let mut restarts = 0;

        loop {
            let err = match self.drive(&mut ctx, &mut games).await {
                Ok(()) => return,
                Err(e) if e.is_cancelled() => {
                    self.leave_game(&mut ctx, &games).await;
                    return;
                }
                Err(e) => e,
            };
            self.fail(&err);

            loop {
                let restart = &self.config.auto_restart;
                if !restart.should_restart(restarts) || self.control.is_stop_requested() {
                    return;
                }
                restarts += 1;
                lock(&self.stats).restarts = restarts;
                self.events.publish(SupervisorEvent::Restarting { attempt: restarts });
                warn!(target: "supervisor", "[{}] Restarting in {:?} (attempt {})", self.name, restart.delay(), restarts);
                if ctx.sleep(restart.delay()).await.is_err() {
                    return;
                }
                match self.relaunch().await {
                    Ok(fresh) => {
                        ctx = fresh;
                        break;
                    }
                    Err(e) if e.is_cancelled() => return,
                    Err(e) => self.fail(&e),
                }
            }
        }
    }

    /// Replace a dead or stuck client with a new one
    async fn relaunch(self: &Arc<Self>) -> Result<ExecutionContext, SupervisorError> {
        self.terminate_client().await;
        if !self.set_status(SupervisorStatus::Starting) {
            return Err(SupervisorError::NotRunning(self.name.clone()));
        }
        let process = self.launch().await?;
        let ctx = self.context(&process);
        if !self.set_status(SupervisorStatus::InGame) {
            self.terminate_client().await;
            return Err(SupervisorError::NotRunning(self.name.clone()));
        }
        Ok(ctx)
    }

    /// Play games until stopped or until an error ends the session
    async fn drive(
        &self,
        ctx: &mut ExecutionContext,
        games: &mut GameManager,
    ) -> Result<(), SupervisorError> {
        let character = build_character(&self.config);
        let runs = build_runs(&self.config);
        let interpreter = Interpreter::new(self.settings.budget);

        loop {
            ctx.checkpoint().await?;
            self.ensure_alive(ctx)?;

            if !ctx.game().in_game() {
                if self.config.companion.enabled {
                    let game = games.create_online_game(ctx).await?;
                    info!(target: "supervisor", "[{}] Hosting game {}", self.name, game);
                } else {
                    games.new_game(ctx).await?;
                }
            }
            let game = lock(&self.stats).games + 1;
            self.events.publish(SupervisorEvent::GameStarted { game });

            for run in &runs {
                ctx.checkpoint().await?;
                let name = run.name().to_string();
                lock(&self.stats).current_run = Some(name.clone());
                self.events.publish(SupervisorEvent::RunStarted { run: name.clone() });
                let started = Instant::now();

                let chain = run_chain(&self.config, character.as_ref(), run.as_ref());
                let result = interpreter.run(ctx, chain).await;
                lock(&self.stats).current_run = None;

                match result {
                    Ok(()) => {
                        lock(&self.stats).runs_completed += 1;
                        self.events.publish(SupervisorEvent::RunFinished {
                            run: name,
                            duration: started.elapsed(),
                        });
                    }
                    Err(e) if e.is_fatal_for_session() => return Err(e.into()),
                    Err(e) => {
                        warn!(target: "supervisor", "[{}] Run {} failed: {}", self.name, name, e);
                        lock(&self.stats).runs_failed += 1;
                        self.record_error(e.to_string());
                        self.events.publish(SupervisorEvent::RunFailed {
                            run: name,
                            reason: e.to_string(),
                        });
                        // The game is abandoned, the next one starts from the first run
                        break;
                    }
                }
            }

            self.ensure_alive(ctx)?;
            games.exit_game(ctx).await?;
            lock(&self.stats).games += 1;
        }
    }

    fn ensure_alive(&self, ctx: &ExecutionContext) -> Result<(), SupervisorError> {
        if ctx.game().process_alive() {
            return Ok(());
        }
        Err(EngineError::ProcessFailure("client process is gone".into()).into())
    }

    /// Best-effort exit on stop; bounded and independent of the stop flag
    async fn leave_game(&self, ctx: &mut ExecutionContext, games: &GameManager) {
        if !ctx.game().process_alive() {
            return;
        }
        match games.exit_game(ctx).await {
            Ok(()) => debug!(target: "supervisor", "[{}] Left the game", self.name),
            Err(e) => warn!(target: "supervisor", "[{}] Could not leave the game: {}", self.name, e),
        }
    }

    async fn terminate_client(&self) {
        let process = lock(&self.process).take();
        if let Some(process) = process {
            if let Err(e) = self.shared.launcher.terminate(&process).await {
                warn!(target: "supervisor", "[{}] {}", self.name, e);
            }
        }
    }

    /// Abort the run loop, wait for it with a bounded timeout, then release
    /// the client.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let status = self.status();
        if !status.is_active() && status != SupervisorStatus::Error {
            return Err(SupervisorError::NotRunning(self.name.clone()));
        }
        info!(target: "supervisor", "[{}] Stopping supervisor", self.name);
        self.set_status(SupervisorStatus::Stopping);
        self.control.request_stop();
        // A paused loop must be able to take the input device to leave the game
        self.control.resume();

        let handle = lock(&self.task).take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.settings.stop_timeout, &mut handle).await {
                Ok(Ok(())) => debug!(target: "supervisor", "[{}] Run loop finished", self.name),
                Ok(Err(e)) => error!(target: "supervisor", "[{}] Run loop panicked: {}", self.name, e),
                Err(_) => {
                    warn!(
                        target: "supervisor",
                        "[{}] Run loop did not stop within {:?}, aborting",
                        self.name,
                        self.settings.stop_timeout
                    );
                    handle.abort();
                }
            }
        }

        if self.config.kill_client_on_stop {
            self.terminate_client().await;
        }
        self.set_status(SupervisorStatus::Stopped);
        info!(target: "supervisor", "[{}] Supervisor stopped", self.name);
        Ok(())
    }

    /// Whether the run loop task is still alive, possibly waiting to restart
    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Shut down a supervisor left in `Error` before it is replaced: its
    /// restart loop ends and its client is released.
    pub(crate) async fn retire(&self) {
        if self.status() != SupervisorStatus::Error {
            return;
        }
        info!(target: "supervisor", "[{}] Retiring failed supervisor", self.name);
        if let Err(e) = self.stop().await {
            warn!(target: "supervisor", "[{}] {}", self.name, e);
        }
        self.terminate_client().await;
    }

    /// Suspend or resume the run loop at its next checkpoint
    pub fn toggle_pause(&self) -> Result<SupervisorStatus, SupervisorError> {
        match self.status() {
            SupervisorStatus::InGame | SupervisorStatus::Paused => {}
            _ => return Err(SupervisorError::NotRunning(self.name.clone())),
        }
        let to = if self.control.toggle_pause() {
            info!(target: "supervisor", "[{}] Paused", self.name);
            SupervisorStatus::Paused
        } else {
            info!(target: "supervisor", "[{}] Resumed", self.name);
            SupervisorStatus::InGame
        };
        self.set_status(to);
        Ok(to)
    }

    /// Current client process, if one is attached
    pub fn process(&self) -> Option<ClientProcess> {
        lock(&self.process).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SupervisorStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [NotStarted, Starting, InGame, Paused, InGame, Stopping, Stopped];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_error_reachable_from_non_terminal_states() {
        for from in [Starting, InGame, Paused, Stopping] {
            assert!(from.can_transition_to(Error));
        }
        assert!(!NotStarted.can_transition_to(Error));
        assert!(!Stopped.can_transition_to(Error));
        assert!(Error.can_transition_to(Starting));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!NotStarted.can_transition_to(InGame));
        assert!(!Stopped.can_transition_to(Paused));
        assert!(!Paused.can_transition_to(Starting));
    }

    #[test]
    fn test_cancellation_is_recognized_through_game_errors() {
        assert!(SupervisorError::Game(GameError::Engine(EngineError::Cancelled)).is_cancelled());
        assert!(!SupervisorError::Game(GameError::ExitTimeout).is_cancelled());
    }
}

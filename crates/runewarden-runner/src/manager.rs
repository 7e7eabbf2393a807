use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use runewarden_engine::{InputArbiter, SessionId};
use tracing::{info, warn};

use crate::config::{CharacterConfig, ConfigOverrides, Difficulty, RunewardenConfig};
use crate::event_bus::EventBus;
use crate::launcher::ClientLauncher;
use crate::supervisor::{
    SharedResources, Supervisor, SupervisorError, SupervisorSettings, SupervisorStats,
    SupervisorStatus,
};

/// Owns every supervisor and the resources they share.
///
/// Starting is serialized: a token-authenticated session never starts while
/// another session is starting, and vice versa.
pub struct SupervisorManager {
    config: Mutex<RunewardenConfig>,
    config_path: Option<PathBuf>,
    shared: SharedResources,
    bus: EventBus,
    supervisors: Mutex<BTreeMap<String, Arc<Supervisor>>>,
    next_session: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SupervisorManager {
    pub fn new(config: RunewardenConfig, launcher: Arc<dyn ClientLauncher>) -> Self {
        let arbiter = Arc::new(InputArbiter::new(config.engine.arbitration_warn()));
        Self {
            config: Mutex::new(config),
            config_path: None,
            shared: SharedResources {
                launcher,
                arbiter,
                launch_gate: Arc::new(tokio::sync::Mutex::new(())),
            },
            bus: EventBus::default(),
            supervisors: Mutex::new(BTreeMap::new()),
            next_session: AtomicU32::new(1),
        }
    }

    /// Persist configuration changes (copies) to `path`
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn arbiter(&self) -> &Arc<InputArbiter> {
        &self.shared.arbiter
    }

    /// Configured character names
    pub fn available_supervisors(&self) -> Vec<String> {
        lock(&self.config).characters.keys().cloned().collect()
    }

    pub fn supervisor(&self, name: &str) -> Option<Arc<Supervisor>> {
        lock(&self.supervisors).get(name).cloned()
    }

    fn get(&self, name: &str) -> Result<Arc<Supervisor>, SupervisorError> {
        self.supervisor(name)
            .ok_or_else(|| SupervisorError::UnknownSupervisor(name.to_string()))
    }

    /// Status of a configured supervisor; `NotStarted` until first started
    pub fn status(&self, name: &str) -> Result<SupervisorStatus, SupervisorError> {
        if let Some(supervisor) = self.supervisor(name) {
            return Ok(supervisor.status());
        }
        lock(&self.config).character(name)?;
        Ok(SupervisorStatus::NotStarted)
    }

    pub fn stats(&self, name: &str) -> Result<SupervisorStats, SupervisorError> {
        if let Some(supervisor) = self.supervisor(name) {
            return Ok(supervisor.stats());
        }
        lock(&self.config).character(name)?;
        Ok(SupervisorStats::default())
    }

    /// Status of every configured supervisor
    pub fn statuses(&self) -> BTreeMap<String, SupervisorStatus> {
        let running = lock(&self.supervisors);
        self.available_supervisors()
            .into_iter()
            .map(|name| {
                let status = running
                    .get(&name)
                    .map_or(SupervisorStatus::NotStarted, |s| s.status());
                (name, status)
            })
            .collect()
    }

    /// Register a fresh supervisor in `Starting`, or refuse.
    ///
    /// Everything happens under the registry lock so two concurrent starts
    /// always see each other.
    fn admit(&self, name: &str) -> Result<Arc<Supervisor>, SupervisorError> {
        let (character, settings) = {
            let config = lock(&self.config);
            let character = Arc::new(config.character(name)?.clone());
            (character, SupervisorSettings::from_config(&config))
        };

        let mut supervisors = lock(&self.supervisors);
        if let Some(existing) = supervisors.get(name) {
            if existing.status().is_active() || existing.is_running() {
                return Err(SupervisorError::AlreadyRunning(name.to_string()));
            }
        }
        if let Some(reason) = token_conflict(&supervisors, name, &character) {
            warn!(target: "supervisor", "[{}] Start refused: {}", name, reason);
            return Err(SupervisorError::StartRefused {
                name: name.to_string(),
                reason,
            });
        }

        let session = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let supervisor = Arc::new(Supervisor::new(
            name,
            session,
            character,
            settings,
            self.shared.clone(),
            self.bus.sender(name),
        ));
        supervisor.set_status(SupervisorStatus::Starting);
        supervisors.insert(name.to_string(), supervisor.clone());
        Ok(supervisor)
    }

    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        // A failed supervisor may still be waiting to restart its own client
        if let Some(previous) = self.supervisor(name) {
            previous.retire().await;
        }
        let supervisor = self.admit(name)?;
        supervisor.start().await
    }

    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        self.get(name)?.stop().await
    }

    pub fn toggle_pause(&self, name: &str) -> Result<SupervisorStatus, SupervisorError> {
        self.get(name)?.toggle_pause()
    }

    /// Stop every active supervisor and drop throwaway characters
    pub async fn stop_all(&self) {
        let active: Vec<_> = lock(&self.supervisors)
            .values()
            .filter(|s| s.status().is_active() || s.status() == SupervisorStatus::Error)
            .cloned()
            .collect();
        for supervisor in active {
            if let Err(e) = supervisor.stop().await {
                warn!(target: "supervisor", "[{}] {}", supervisor.name(), e);
            }
        }

        let removed = lock(&self.config).remove_tmp_characters();
        if !removed.is_empty() {
            info!(target: "supervisor", "Removed tmp characters: {}", removed.join(", "));
            self.persist();
        }
    }

    /// Copy a character configuration, returning the new name
    pub fn copy_character(
        &self,
        source: &str,
        target: &str,
        overrides: &ConfigOverrides,
    ) -> Result<String, SupervisorError> {
        let name = lock(&self.config).create_from_source(source, target, overrides)?;
        info!(target: "supervisor", "Created character {} from {}", name, source);
        self.persist();
        Ok(name)
    }

    /// Throwaway copy of `source` that leaves its client running on stop
    pub fn tmp_copy(
        &self,
        source: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<String, SupervisorError> {
        self.copy_character(source, "", &ConfigOverrides::tmp(difficulty))
    }

    fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = lock(&self.config).save_to(path) {
            warn!(target: "supervisor", "Failed to save config to {}: {}", path.display(), e);
        }
    }
}

/// Why starting `name` now would run two logins at once, if it would
fn token_conflict(
    supervisors: &BTreeMap<String, Arc<Supervisor>>,
    name: &str,
    character: &CharacterConfig,
) -> Option<String> {
    let starting = supervisors
        .values()
        .filter(|s| s.name() != name && s.status() == SupervisorStatus::Starting);
    for other in starting {
        if character.uses_token_auth() {
            return Some(format!("{} is starting and token login is exclusive", other.name()));
        }
        if other.config().uses_token_auth() {
            return Some(format!("{} is starting with token login", other.name()));
        }
    }
    None
}

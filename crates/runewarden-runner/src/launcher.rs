//! Client process launching.
//!
//! Launching is a system-wide critical section: stray client handles are
//! cleaned up before and after every launch, and the supervisor manager makes
//! sure only one launch is in flight at a time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use runewarden_engine::sim::SimulatedClient;
use runewarden_engine::SessionBackend;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::{AuthMethod, CharacterConfig};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn client: {0}")]
    Spawn(String),
    #[error("client started without a process id")]
    NoProcessId,
    #[error("failed to attach to client process {pid}: {reason}")]
    Attach { pid: u32, reason: String },
    #[error("failed to terminate client: {0}")]
    Terminate(String),
}

/// A running client and the adapters bound to it
#[derive(Clone)]
pub struct ClientProcess {
    pub pid: Option<u32>,
    pub backend: SessionBackend,
}

impl std::fmt::Debug for ClientProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProcess").field("pid", &self.pid).finish()
    }
}

#[async_trait]
pub trait ClientLauncher: Send + Sync {
    /// Close handles left behind by clients that are gone
    async fn kill_stray_handles(&self) -> Result<(), LaunchError>;

    /// Start a client for `name` and attach the session adapters to it
    async fn launch(&self, name: &str, args: &[String]) -> Result<ClientProcess, LaunchError>;

    async fn terminate(&self, process: &ClientProcess) -> Result<(), LaunchError>;
}

/// Client command line for a character
pub fn launch_args(config: &CharacterConfig) -> Vec<String> {
    let mut args: Vec<String> = match config.auth_method {
        AuthMethod::TokenAuth => vec!["-uid".into(), "osi".into()],
        AuthMethod::UsernamePassword => vec![
            "-username".into(),
            config.username.clone(),
            "-password".into(),
            config.password.clone(),
            "-address".into(),
            config.realm.clone(),
        ],
        AuthMethod::None => Vec::new(),
    };
    args.extend(config.command_line_args.split_whitespace().map(String::from));
    args
}

type AttachFn = Arc<dyn Fn(u32) -> Result<SessionBackend, LaunchError> + Send + Sync>;

/// Launches the real client executable.
///
/// Reading the world and injecting input are platform adapters; `attach`
/// binds them to the started process id.
pub struct CommandLauncher {
    executable: PathBuf,
    attach: AttachFn,
    children: tokio::sync::Mutex<HashMap<u32, Child>>,
}

impl CommandLauncher {
    pub fn new(
        executable: impl Into<PathBuf>,
        attach: impl Fn(u32) -> Result<SessionBackend, LaunchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            executable: executable.into(),
            attach: Arc::new(attach),
            children: tokio::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ClientLauncher for CommandLauncher {
    async fn kill_stray_handles(&self) -> Result<(), LaunchError> {
        let mut children = self.children.lock().await;
        let mut exited = Vec::new();
        for (pid, child) in children.iter_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(target: "launcher", "Client {} exited with {}", pid, status);
                    exited.push(*pid);
                }
                Ok(None) => {}
                Err(e) => warn!(target: "launcher", "Failed to poll client {}: {}", pid, e),
            }
        }
        for pid in exited {
            children.remove(&pid);
        }
        Ok(())
    }

    async fn launch(&self, name: &str, args: &[String]) -> Result<ClientProcess, LaunchError> {
        let child = Command::new(&self.executable)
            .args(args)
            .spawn()
            .map_err(|e| LaunchError::Spawn(e.to_string()))?;
        let pid = child.id().ok_or(LaunchError::NoProcessId)?;
        info!(target: "launcher", "Started client for {} (pid {})", name, pid);

        self.children.lock().await.insert(pid, child);
        let backend = match (self.attach)(pid) {
            Ok(backend) => backend,
            Err(e) => {
                if let Some(mut child) = self.children.lock().await.remove(&pid) {
                    let _ = child.kill().await;
                }
                return Err(e);
            }
        };
        Ok(ClientProcess {
            pid: Some(pid),
            backend,
        })
    }

    async fn terminate(&self, process: &ClientProcess) -> Result<(), LaunchError> {
        let Some(pid) = process.pid else {
            return Ok(());
        };
        let Some(mut child) = self.children.lock().await.remove(&pid) else {
            return Ok(());
        };
        child
            .kill()
            .await
            .map_err(|e| LaunchError::Terminate(e.to_string()))?;
        info!(target: "launcher", "Terminated client pid {}", pid);
        Ok(())
    }
}

/// Launcher of in-memory clients, for dry runs and tests
#[derive(Default)]
pub struct SimulatedLauncher {
    launch_delay: Duration,
    fail_launches: bool,
    clients: Mutex<HashMap<String, SimulatedClient>>,
    launches: Mutex<Vec<(String, Vec<String>)>>,
    stray_cleanups: AtomicUsize,
    terminations: AtomicUsize,
}

impl SimulatedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time each launch takes
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_launches = true;
        self
    }

    /// Latest client launched for `name`
    pub fn client(&self, name: &str) -> Option<SimulatedClient> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn launches(&self) -> Vec<(String, Vec<String>)> {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn stray_cleanups(&self) -> usize {
        self.stray_cleanups.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientLauncher for SimulatedLauncher {
    async fn kill_stray_handles(&self) -> Result<(), LaunchError> {
        self.stray_cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn launch(&self, name: &str, args: &[String]) -> Result<ClientProcess, LaunchError> {
        self.launches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), args.to_vec()));
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        if self.fail_launches {
            return Err(LaunchError::Spawn("simulated launch failure".into()));
        }

        let client = SimulatedClient::new().with_default_reactions();
        client.update(|s| {
            s.in_game = false;
            s.in_character_selection = true;
        });
        let backend = client.backend();
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), client);
        Ok(ClientProcess { pid: None, backend })
    }

    async fn terminate(&self, process: &ClientProcess) -> Result<(), LaunchError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        debug!(target: "launcher", "Terminated simulated client {:?}", process);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_auth_args() {
        let config = CharacterConfig {
            auth_method: AuthMethod::TokenAuth,
            command_line_args: " -w  -ns ".into(),
            ..CharacterConfig::default()
        };
        assert_eq!(launch_args(&config), ["-uid", "osi", "-w", "-ns"]);
    }

    #[test]
    fn test_username_password_args() {
        let config = CharacterConfig {
            auth_method: AuthMethod::UsernamePassword,
            username: "bob".into(),
            password: "hunter2".into(),
            realm: "eu.example.net".into(),
            ..CharacterConfig::default()
        };
        assert_eq!(
            launch_args(&config),
            ["-username", "bob", "-password", "hunter2", "-address", "eu.example.net"]
        );
    }

    #[test]
    fn test_no_auth_args() {
        assert!(launch_args(&CharacterConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_simulated_launch_records_args() {
        let launcher = SimulatedLauncher::new();
        let process = launcher.launch("sorc", &["-w".into()]).await.unwrap();
        assert!(process.backend.game.is_in_character_selection_screen());
        assert_eq!(launcher.launches(), vec![("sorc".to_string(), vec!["-w".to_string()])]);
        assert!(launcher.client("sorc").is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_launcher_spawns_and_terminates() {
        let launcher = CommandLauncher::new("sleep", |_| Ok(SimulatedClient::new().backend()));
        let process = launcher.launch("sorc", &["30".into()]).await.unwrap();
        assert!(process.pid.is_some());
        launcher.kill_stray_handles().await.unwrap();
        assert_eq!(launcher.children.lock().await.len(), 1);

        launcher.terminate(&process).await.unwrap();
        assert!(launcher.children.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_command_launcher_reports_spawn_failure() {
        let launcher = CommandLauncher::new("/nonexistent/client", |_| Ok(SimulatedClient::new().backend()));
        let err = launcher.launch("sorc", &[]).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }
}

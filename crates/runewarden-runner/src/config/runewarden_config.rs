use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::character_config::{CharacterConfig, ConfigOverrides};
use crate::config::paths::ProjectPaths;

pub const APP_NAME: &str = "runewarden";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("IO error on config: {0}")]
    IoError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Unknown character '{0}'")]
    UnknownCharacter(String),
    #[error("Character '{0}' already exists")]
    CharacterExists(String),
    #[error("Could not determine the config directory")]
    NoConfigDir,
}

/// Client process settings shared by all characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Game client executable
    pub executable: PathBuf,
    /// Log directory, the data directory's `logs` when unset
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
    /// Wait for the client to reach a ready screen after launch
    pub ready_timeout_secs: u64,
    /// Wait for a supervisor to wind down before killing its client
    pub stop_timeout_secs: u64,
    /// Pause after a launch before the next one may begin
    pub launch_settle_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("Game.exe"),
            log_dir: None,
            debug: false,
            ready_timeout_secs: 60,
            stop_timeout_secs: 30,
            launch_settle_ms: 2000,
        }
    }
}

impl ClientSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }
}

/// Interpreter and arbitration tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_iterations: u64,
    pub max_run_duration_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_jitter_ms: u64,
    /// Log an arbitration timeout after waiting this long for input
    pub arbitration_warn_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            max_run_duration_secs: 15 * 60,
            poll_interval_ms: 100,
            poll_jitter_ms: 50,
            arbitration_warn_secs: 30,
        }
    }
}

impl EngineSettings {
    pub fn budget(&self) -> runewarden_engine::Budget {
        runewarden_engine::Budget {
            max_iterations: self.max_iterations,
            max_duration: Duration::from_secs(self.max_run_duration_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_jitter: Duration::from_millis(self.poll_jitter_ms),
        }
    }

    pub fn arbitration_warn(&self) -> Duration {
        Duration::from_secs(self.arbitration_warn_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunewardenConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub characters: BTreeMap<String, CharacterConfig>,
}

impl RunewardenConfig {
    pub fn config_path() -> Result<PathBuf, ConfigLoadError> {
        let paths = ProjectPaths::new(APP_NAME).ok_or(ConfigLoadError::NoConfigDir)?;
        Ok(paths.config_dir().join("config.toml"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigLoadError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigLoadError::SerializeError(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn character(&self, name: &str) -> Result<&CharacterConfig, ConfigLoadError> {
        self.characters
            .get(name)
            .ok_or_else(|| ConfigLoadError::UnknownCharacter(name.to_string()))
    }

    /// Copy the settings of `source` into a new character `target`.
    ///
    /// An empty target names the copy `<source>_tmp`. Returns the new name.
    pub fn create_from_source(
        &mut self,
        source: &str,
        target: &str,
        overrides: &ConfigOverrides,
    ) -> Result<String, ConfigLoadError> {
        let mut copy = self.character(source)?.clone();
        let target = if target.is_empty() {
            format!("{}_tmp", source)
        } else {
            target.to_string()
        };
        if self.characters.contains_key(&target) {
            return Err(ConfigLoadError::CharacterExists(target));
        }

        copy.apply(overrides);
        self.characters.insert(target.clone(), copy);
        Ok(target)
    }

    /// Remove every throwaway copy
    pub fn remove_tmp_characters(&mut self) -> Vec<String> {
        let tmp: Vec<String> = self
            .characters
            .iter()
            .filter(|(_, c)| c.tmp)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &tmp {
            self.characters.remove(name);
        }
        tmp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::character_config::{AuthMethod, Difficulty, RunName};

    fn sample() -> RunewardenConfig {
        let mut config = RunewardenConfig::default();
        config.characters.insert(
            "sorc".into(),
            CharacterConfig {
                auth_method: AuthMethod::UsernamePassword,
                username: "sorc".into(),
                runs: vec![RunName::Countess, RunName::Eldritch],
                ..CharacterConfig::default()
            },
        );
        config
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = sample();
        config.save_to(&path).unwrap();

        let loaded = RunewardenConfig::load_from(&path).unwrap();
        assert_eq!(loaded.characters, config.characters);
        assert_eq!(loaded.client.ready_timeout_secs, 60);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = RunewardenConfig::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigLoadError::NotFound)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[characters.pala]\nkind = \"zealer\"\ndifficulty = \"hell\"\nruns = [\"lower_kurast\"]\n",
        )
        .unwrap();

        let config = RunewardenConfig::load_from(&path).unwrap();
        let pala = config.character("pala").unwrap();
        assert_eq!(pala.difficulty, Difficulty::Hell);
        assert_eq!(pala.runs, vec![RunName::LowerKurast]);
        assert_eq!(pala.town_portal_key, 't');
        assert_eq!(config.engine.poll_interval_ms, 100);
    }

    #[test]
    fn test_copy_and_tmp_copy() {
        let mut config = sample();
        let name = config
            .create_from_source("sorc", "sorc2", &ConfigOverrides::default())
            .unwrap();
        assert_eq!(name, "sorc2");
        assert_eq!(config.characters["sorc2"], config.characters["sorc"]);

        let tmp = config
            .create_from_source("sorc", "", &ConfigOverrides::tmp(Some(Difficulty::Nightmare)))
            .unwrap();
        assert_eq!(tmp, "sorc_tmp");
        let copy = &config.characters["sorc_tmp"];
        assert!(copy.tmp);
        assert!(!copy.kill_client_on_stop);
        assert_eq!(copy.difficulty, Difficulty::Nightmare);

        assert!(matches!(
            config.create_from_source("sorc", "sorc2", &ConfigOverrides::default()),
            Err(ConfigLoadError::CharacterExists(_))
        ));
        assert!(matches!(
            config.create_from_source("ghost", "x", &ConfigOverrides::default()),
            Err(ConfigLoadError::UnknownCharacter(_))
        ));
        assert_eq!(config.remove_tmp_characters(), vec!["sorc_tmp".to_string()]);
    }
}

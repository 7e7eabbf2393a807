use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the client logs into the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Single-use token login; at most one such client may start at a time
    TokenAuth,
    UsernamePassword,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Normal,
    Nightmare,
    Hell,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Normal => "normal",
            Difficulty::Nightmare => "nightmare",
            Difficulty::Hell => "hell",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Difficulty::Normal),
            "nightmare" => Ok(Difficulty::Nightmare),
            "hell" => Ok(Difficulty::Hell),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunName {
    Countess,
    Eldritch,
    LowerKurast,
    ArachnidLair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterKind {
    /// Plain melee attacks
    #[default]
    Melee,
    /// Paladin using Zeal under Fanaticism
    Zealer,
}

/// Potion and chicken thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub healing_potion_at: u32,
    pub mana_potion_at: u32,
    pub rejuv_potion_at: u32,
    /// Leave the game under this health
    pub chicken_at: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            healing_potion_at: 60,
            mana_potion_at: 25,
            rejuv_potion_at: 40,
            chicken_at: 20,
        }
    }
}

/// Automatic restart after a supervisor error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRestartConfig {
    pub enabled: bool,
    pub max_restarts: u32,
    pub delay_secs: u64,
}

impl Default for AutoRestartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_restarts: 3,
            delay_secs: 10,
        }
    }
}

impl AutoRestartConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn should_restart(&self, restarts: u32) -> bool {
        self.enabled && restarts < self.max_restarts
    }
}

/// Online game hosting: create named games instead of offline ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub enabled: bool,
    /// Game name prefix, the game counter is appended
    pub game_name_template: String,
    pub game_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EldritchConfig {
    pub kill_shenk: bool,
}

impl Default for EldritchConfig {
    fn default() -> Self {
        Self { kill_shenk: true }
    }
}

/// Behavior of one character, immutable while its supervisor runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    pub auth_method: AuthMethod,
    pub username: String,
    pub password: String,
    pub auth_token: String,
    pub realm: String,
    /// Extra client command line, split on whitespace
    pub command_line_args: String,
    pub difficulty: Difficulty,
    pub runs: Vec<RunName>,
    pub kind: CharacterKind,
    pub health: HealthConfig,
    /// Belt columns reserved for rejuvenation potions
    pub rejuv_columns: Vec<u8>,
    /// Item names to pick up
    pub pickit: Vec<String>,
    pub town_portal_key: char,
    pub kill_client_on_stop: bool,
    pub auto_restart: AutoRestartConfig,
    pub companion: CompanionConfig,
    pub eldritch: EldritchConfig,
    /// Throwaway copy created from the command terminal
    pub tmp: bool,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            auth_method: AuthMethod::None,
            username: String::new(),
            password: String::new(),
            auth_token: String::new(),
            realm: String::new(),
            command_line_args: String::new(),
            difficulty: Difficulty::Normal,
            runs: vec![RunName::Countess],
            kind: CharacterKind::Melee,
            health: HealthConfig::default(),
            rejuv_columns: vec![3],
            pickit: Vec::new(),
            town_portal_key: 't',
            kill_client_on_stop: true,
            auto_restart: AutoRestartConfig::default(),
            companion: CompanionConfig::default(),
            eldritch: EldritchConfig::default(),
            tmp: false,
        }
    }
}

impl CharacterConfig {
    pub fn uses_token_auth(&self) -> bool {
        self.auth_method == AuthMethod::TokenAuth
    }

    /// Apply every override that is set
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(difficulty) = overrides.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(runs) = &overrides.runs {
            self.runs = runs.clone();
        }
        if let Some(kill) = overrides.kill_client_on_stop {
            self.kill_client_on_stop = kill;
        }
        if let Some(tmp) = overrides.tmp {
            self.tmp = tmp;
        }
        if let Some(auth_method) = overrides.auth_method {
            self.auth_method = auth_method;
        }
        if let Some(args) = &overrides.command_line_args {
            self.command_line_args = args.clone();
        }
    }
}

/// Field-by-field partial update of a [`CharacterConfig`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub difficulty: Option<Difficulty>,
    pub runs: Option<Vec<RunName>>,
    pub kill_client_on_stop: Option<bool>,
    pub tmp: Option<bool>,
    pub auth_method: Option<AuthMethod>,
    pub command_line_args: Option<String>,
}

impl ConfigOverrides {
    /// Overrides of a throwaway terminal copy
    pub fn tmp(difficulty: Option<Difficulty>) -> Self {
        Self {
            difficulty,
            kill_client_on_stop: Some(false),
            tmp: Some(true),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_only_touch_set_fields() {
        let mut config = CharacterConfig {
            username: "bot".into(),
            ..CharacterConfig::default()
        };
        config.apply(&ConfigOverrides::tmp(Some(Difficulty::Hell)));

        assert_eq!(config.difficulty, Difficulty::Hell);
        assert!(config.tmp);
        assert!(!config.kill_client_on_stop);
        assert_eq!(config.username, "bot");
        assert_eq!(config.runs, vec![RunName::Countess]);
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("Nightmare".parse::<Difficulty>(), Ok(Difficulty::Nightmare));
        assert!("inferno".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Hell.to_string(), "hell");
    }

    #[test]
    fn test_auto_restart_bound() {
        let restart = AutoRestartConfig {
            enabled: true,
            max_restarts: 2,
            delay_secs: 1,
        };
        assert!(restart.should_restart(1));
        assert!(!restart.should_restart(2));
        assert!(!AutoRestartConfig::default().should_restart(0));
    }
}

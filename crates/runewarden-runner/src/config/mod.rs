pub mod character_config;
pub mod paths;
pub mod runewarden_config;

pub use character_config::{
    AuthMethod, AutoRestartConfig, CharacterConfig, CharacterKind, CompanionConfig, ConfigOverrides,
    Difficulty, EldritchConfig, HealthConfig, RunName,
};
pub use paths::ProjectPaths;
pub use runewarden_config::{
    ClientSettings, ConfigLoadError, EngineSettings, RunewardenConfig, APP_NAME,
};

use std::path::{Path, PathBuf};

/// Per-user directories of the application.
///
/// Follows the XDG base directory layout on Unix-like systems
/// (`$XDG_CONFIG_HOME`, `$XDG_DATA_HOME`, `$XDG_CACHE_HOME`, falling back to
/// `~/.config`, `~/.local/share` and `~/.cache`) and `%APPDATA%` /
/// `%LOCALAPPDATA%` on Windows.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    config: PathBuf,
    data: PathBuf,
    cache: PathBuf,
}

impl ProjectPaths {
    /// Resolve the directories of `name` from the environment.
    ///
    /// Returns `None` when no home directory can be determined.
    pub fn new(name: &str) -> Option<Self> {
        let home = env_path("HOME").or_else(|| env_path("USERPROFILE"))?;
        Some(Self::resolve(name, &home, env_path))
    }

    /// Directories of `name` below an explicit home, ignoring overrides
    pub fn with_home(name: &str, home: &Path) -> Self {
        Self::resolve(name, home, |_| None)
    }

    fn resolve(name: &str, home: &Path, var: impl Fn(&str) -> Option<PathBuf>) -> Self {
        if cfg!(target_os = "windows") {
            let roaming = var("APPDATA").unwrap_or_else(|| home.join("AppData").join("Roaming"));
            let local = var("LOCALAPPDATA").unwrap_or_else(|| home.join("AppData").join("Local"));
            return Self {
                config: roaming.join(name),
                data: roaming.join(name),
                cache: local.join(name),
            };
        }

        let base = |key: &str, fallback: &[&str]| {
            var(key)
                .unwrap_or_else(|| fallback.iter().fold(home.to_path_buf(), |p, c| p.join(c)))
                .join(name)
        };
        Self {
            config: base("XDG_CONFIG_HOME", &[".config"]),
            data: base("XDG_DATA_HOME", &[".local", "share"]),
            cache: base("XDG_CACHE_HOME", &[".cache"]),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// Default directory for log files
    pub fn log_dir(&self) -> PathBuf {
        self.data.join("logs")
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_xdg_fallbacks_below_home() {
        let paths = ProjectPaths::with_home("runewarden", Path::new("/home/bot"));
        assert_eq!(paths.config_dir(), Path::new("/home/bot/.config/runewarden"));
        assert_eq!(paths.data_dir(), Path::new("/home/bot/.local/share/runewarden"));
        assert_eq!(paths.cache_dir(), Path::new("/home/bot/.cache/runewarden"));
        assert_eq!(paths.log_dir(), Path::new("/home/bot/.local/share/runewarden/logs"));
    }

    #[test]
    fn test_dirs_contain_name() {
        if let Some(paths) = ProjectPaths::new("runewarden") {
            assert!(paths.config_dir().ends_with("runewarden"));
            assert!(paths.data_dir().ends_with("runewarden"));
        }
    }
}

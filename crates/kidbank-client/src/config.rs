//! # Client Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KIDBANK_BACKEND=sqlite                                             │
//! │     KIDBANK_AUTH_TIMEOUT_SECS=10                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kidbank/kidbank.toml (Linux)                             │
//! │     ~/Library/Application Support/com.kidbank.kidbank/kidbank.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     in-memory backend, 5s auth timeout, 50 transactions               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [app]
//! name = "EasyKidsBank"
//! auth_timeout_secs = 5
//! transaction_history_limit = 50
//! default_theme = "default"
//!
//! [storage]
//! backend = "sqlite"            # memory | sqlite
//! database_path = "/var/lib/kidbank/kidbank.db"
//! preferences_path = "/home/jo/.local/share/kidbank/preferences.toml"
//!
//! [ui]
//! max_toasts = 5
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Backend
// =============================================================================

/// Which gateway implementation the shell plugs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Everything in process memory; gone on exit.
    #[default]
    Memory,
    /// Local SQLite file.
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Backend::Memory),
            "sqlite" | "db" => Ok(Backend::Sqlite),
            other => Err(ConfigError::Invalid(format!(
                "Unknown backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Suffix of every document title.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// How long startup waits for the first auth event.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Transactions kept in a kid's live history.
    #[serde(default = "default_history_limit")]
    pub transaction_history_limit: usize,

    /// Theme used when no preference has been saved.
    #[serde(default = "default_theme")]
    pub default_theme: String,
}

fn default_app_name() -> String {
    "EasyKidsBank".to_string()
}

fn default_auth_timeout() -> u64 {
    5
}

fn default_history_limit() -> usize {
    kidbank_core::TRANSACTION_HISTORY_LIMIT
}

fn default_theme() -> String {
    kidbank_core::DEFAULT_THEME_ID.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            name: default_app_name(),
            auth_timeout_secs: default_auth_timeout(),
            transaction_history_limit: default_history_limit(),
            default_theme: default_theme(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: Backend,

    /// SQLite file. Defaults to the platform data dir.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// File holding the last applied theme. Defaults to the platform data dir.
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSettings {
    /// Oldest toasts are dropped beyond this many.
    #[serde(default = "default_max_toasts")]
    pub max_toasts: usize,
}

fn default_max_toasts() -> usize {
    5
}

impl Default for UiSettings {
    fn default() -> Self {
        UiSettings {
            max_toasts: default_max_toasts(),
        }
    }
}

// =============================================================================
// Client Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub app: AppSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub ui: UiSettings,
}

impl ClientConfig {
    /// Platform config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "kidbank", "kidbank")
            .map(|dirs| dirs.config_dir().join("kidbank.toml"))
    }

    fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("com", "kidbank", "kidbank")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Loads defaults, then `path` (or the platform default) if it exists,
    /// then environment overrides, then validates.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                toml::from_str(&content)?
            }
            _ => ClientConfig::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load) but never fails.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config, using defaults: {}", e);
                ClientConfig::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Applies `KIDBANK_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(name) = lookup("KIDBANK_APP_NAME") {
            self.app.name = name;
        }
        if let Some(secs) = lookup("KIDBANK_AUTH_TIMEOUT_SECS") {
            self.app.auth_timeout_secs = secs.parse().map_err(|_| {
                ConfigError::Invalid(format!("KIDBANK_AUTH_TIMEOUT_SECS is not a number: {secs}"))
            })?;
        }
        if let Some(backend) = lookup("KIDBANK_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("KIDBANK_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("KIDBANK_PREFS_PATH") {
            self.storage.preferences_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::Invalid("app.name cannot be empty".to_string()));
        }
        if self.app.auth_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "app.auth_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.app.transaction_history_limit == 0 {
            return Err(ConfigError::Invalid(
                "app.transaction_history_limit must be at least 1".to_string(),
            ));
        }
        if self.ui.max_toasts == 0 {
            return Err(ConfigError::Invalid("ui.max_toasts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.app.auth_timeout_secs)
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("kidbank.db"))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.storage
            .preferences_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("preferences.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.app.name, "EasyKidsBank");
        assert_eq!(config.auth_timeout(), Duration::from_secs(5));
        assert_eq!(config.app.transaction_history_limit, 50);
        assert_eq!(config.storage.backend, Backend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [storage]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, Backend::Sqlite);
        assert_eq!(config.app.auth_timeout_secs, 5);
        assert_eq!(config.ui.max_toasts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KIDBANK_APP_NAME", "Piggy"),
            ("KIDBANK_AUTH_TIMEOUT_SECS", "9"),
            ("KIDBANK_BACKEND", "SQLITE"),
            ("KIDBANK_DB_PATH", "/tmp/k.db"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.app.name, "Piggy");
        assert_eq!(config.app.auth_timeout_secs, 9);
        assert_eq!(config.storage.backend, Backend::Sqlite);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/k.db"));
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = ClientConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "KIDBANK_AUTH_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = ClientConfig::default();
        config.app.auth_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kidbank.toml");

        let mut config = ClientConfig::default();
        config.app.transaction_history_limit = 20;
        config.storage.backend = Backend::Sqlite;
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.app.transaction_history_limit, 20);
        assert_eq!(loaded.storage.backend, Backend::Sqlite);
    }

    #[test]
    fn test_load_or_default_survives_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kidbank.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        assert!(ClientConfig::load(Some(&path)).is_err());
        let config = ClientConfig::load_or_default(Some(&path));
        assert_eq!(config.app.name, "EasyKidsBank");
    }
}

//! The one piece of state kept on this device: the last applied theme.
//!
//! ```toml
//! theme = "ocean-blue"
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

pub trait PreferenceStore {
    fn theme(&self) -> Option<String>;

    fn set_theme(&self, theme_id: &str) -> ConfigResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<String>,
}

/// TOML file under the data directory.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePreferences { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> ConfigResult<PreferenceFile> {
        if !self.path.exists() {
            return Ok(PreferenceFile::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl PreferenceStore for FilePreferences {
    fn theme(&self) -> Option<String> {
        match self.read() {
            Ok(file) => file.theme,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable preferences");
                None
            }
        }
    }

    fn set_theme(&self, theme_id: &str) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string(&PreferenceFile {
            theme: Some(theme_id.to_string()),
        })?;
        fs::write(&self.path, content).map_err(write_err)?;
        debug!(theme = theme_id, "Theme preference saved");
        Ok(())
    }
}

/// Preference kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    theme: RefCell<Option<String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        MemoryPreferences::default()
    }

    pub fn with_theme(theme_id: &str) -> Self {
        MemoryPreferences {
            theme: RefCell::new(Some(theme_id.to_string())),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn theme(&self) -> Option<String> {
        self.theme.borrow().clone()
    }

    fn set_theme(&self, theme_id: &str) -> ConfigResult<()> {
        *self.theme.borrow_mut() = Some(theme_id.to_string());
        Ok(())
    }
}

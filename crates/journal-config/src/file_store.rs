//! TOML-backed preference store.
//!
//! The file is a flat table of strings keyed by the namespaced preference
//! keys. Every write rewrites the whole file atomically (write to `.tmp`,
//! then rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use journal_common::ConfigError;
use tracing::{debug, info, warn};

use crate::paths::default_preferences_path;
use crate::store::{PreferenceKey, PreferenceStore};

pub struct FilePreferenceStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    /// Open the store at the platform default path.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::open(default_preferences_path()?))
    }

    /// Open the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or unparseable file is
    /// logged and also starts empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => {
                info!(path = %path.display(), count = entries.len(), "loaded preferences");
                entries
            }
            Err(ConfigError::FileNotFound(_)) => {
                debug!(path = %path.display(), "no preference file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!("{e}, starting with empty preferences");
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    fn set(&self, key: PreferenceKey, value: &str) -> Result<(), ConfigError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.as_str().to_string(), value.to_string());
        save_entries(&entries, &self.path)
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse {}: {e}", path.display())))
}

fn save_entries(entries: &BTreeMap<String, String>, path: &Path) -> Result<(), ConfigError> {
    let toml_str = toml::to_string(entries)
        .map_err(|e| ConfigError::WriteError(format!("failed to serialize preferences: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::WriteError(format!(
                "failed to create preference directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, &toml_str).map_err(|e| {
        ConfigError::WriteError(format!("failed to write {}: {e}", tmp_path.display()))
    })?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        // Rename can fail on Windows when the target is open.
        warn!("atomic rename failed ({e}), falling back to direct write");
        std::fs::write(path, &toml_str).map_err(|e2| {
            ConfigError::WriteError(format!("failed to write {}: {e2}", path.display()))
        })?;
    }

    debug!(path = %path.display(), "preferences saved");
    Ok(())
}

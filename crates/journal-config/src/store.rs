//! Durable key-value surface for scalar preferences.
//!
//! Stores hold raw strings only; the preference stores built on top do
//! the parsing and fall back to defaults.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use journal_common::ConfigError;

/// Prefix shared by every key this application writes.
pub const STORAGE_PREFIX: &str = "VRCJournal-";

/// The preferences the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    Theme,
    Locale,
    SelectedUser,
}

impl PreferenceKey {
    /// Namespaced storage key, e.g. `VRCJournal-theme`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "VRCJournal-theme",
            Self::Locale => "VRCJournal-locale",
            Self::SelectedUser => "VRCJournal-selected-user",
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: PreferenceKey) -> Option<String>;

    /// Write `value` durably before returning.
    fn set(&self, key: PreferenceKey, value: &str) -> Result<(), ConfigError>;
}

/// Persist `value`, logging instead of failing. Preference writes are never
/// fatal for the caller.
pub(crate) fn persist(store: &dyn PreferenceStore, key: PreferenceKey, value: &str) {
    if let Err(e) = store.set(key, value) {
        tracing::warn!(key = key.as_str(), value, "failed to persist preference: {e}");
    }
}

/// Process-local store, for tests and `--memory-prefs` runs.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with raw values.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (PreferenceKey, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut map = store.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in entries {
                map.insert(key.as_str(), value.to_string());
            }
        }
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    fn set(&self, key: PreferenceKey, value: &str) -> Result<(), ConfigError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.as_str(), value.to_string());
        Ok(())
    }
}

//! Theme preference and its reflection onto the document root.
//!
//! The active theme is published as a `data-theme` attribute on the root
//! element. `system` removes the attribute so the stylesheet's
//! `prefers-color-scheme` rules apply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use journal_common::Theme;
use tokio::sync::watch;
use tracing::debug;

use crate::store::{persist, PreferenceKey, PreferenceStore};

/// Root attribute carrying the active theme.
pub const THEME_ATTRIBUTE: &str = "data-theme";

/// The element theme attributes are written to.
pub trait DocumentRoot: Send + Sync {
    fn set_attribute(&self, name: &str, value: &str);
    fn remove_attribute(&self, name: &str);
}

/// Apply `theme` to `root`.
pub fn apply_theme(root: &dyn DocumentRoot, theme: Theme) {
    match theme.root_attribute() {
        Some(value) => root.set_attribute(THEME_ATTRIBUTE, value),
        None => root.remove_attribute(THEME_ATTRIBUTE),
    }
}

/// In-memory root, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct AttributeRoot {
    attributes: Mutex<HashMap<String, String>>,
}

impl AttributeRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl DocumentRoot for AttributeRoot {
    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

/// Root living in a webview: each change becomes a JavaScript snippet
/// handed to `sink` (typically `evaluate_script`).
pub struct ScriptRoot {
    sink: Box<dyn Fn(String) + Send + Sync>,
}

impl ScriptRoot {
    pub fn new(sink: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }
}

impl DocumentRoot for ScriptRoot {
    fn set_attribute(&self, name: &str, value: &str) {
        (self.sink)(format!(
            "document.documentElement.setAttribute('{}', '{}');",
            escape_js(name),
            escape_js(value)
        ));
    }

    fn remove_attribute(&self, name: &str) {
        (self.sink)(format!(
            "document.documentElement.removeAttribute('{}');",
            escape_js(name)
        ));
    }
}

/// Escape a value for a single-quoted JavaScript string literal.
fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('<', "\\x3c")
}

pub struct ThemeStore {
    store: Arc<dyn PreferenceStore>,
    root: Arc<dyn DocumentRoot>,
    theme: watch::Sender<Theme>,
}

impl ThemeStore {
    pub fn new(store: Arc<dyn PreferenceStore>, root: Arc<dyn DocumentRoot>) -> Self {
        let (theme, _) = watch::channel(Theme::System);
        Self { store, root, theme }
    }

    /// Load the saved theme and reflect it onto the root. A missing value
    /// means `system`; an unknown one is replaced by `system` on disk.
    pub fn init(&self) -> Theme {
        let theme = match self.store.get(PreferenceKey::Theme) {
            Some(raw) => Theme::from_name(&raw).unwrap_or_else(|| {
                debug!(saved = %raw, "replacing unknown saved theme");
                persist(self.store.as_ref(), PreferenceKey::Theme, Theme::System.as_str());
                Theme::System
            }),
            None => Theme::System,
        };
        self.theme.send_replace(theme);
        apply_theme(self.root.as_ref(), theme);
        theme
    }

    pub fn set_theme(&self, theme: Theme) {
        self.theme.send_replace(theme);
        persist(self.store.as_ref(), PreferenceKey::Theme, theme.as_str());
        apply_theme(self.root.as_ref(), theme);
    }

    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }
}

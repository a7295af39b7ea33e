//! Persisted client preferences.
//!
//! A [`PreferenceStore`] holds raw strings under `VRCJournal-` keys. The
//! locale, theme and user-selection stores parse those strings, fall back
//! to defaults, and publish the current value through a
//! [`tokio::sync::watch`] cell that views subscribe to.

pub mod file_store;
pub mod locale;
pub mod paths;
pub mod selection;
pub mod store;
pub mod theme;

pub use file_store::FilePreferenceStore;
pub use locale::{detect_system_locale, LocaleStore, OsLocale, SystemLocale};
pub use paths::default_preferences_path;
pub use selection::SelectedUserStore;
pub use store::{MemoryPreferenceStore, PreferenceKey, PreferenceStore, STORAGE_PREFIX};
pub use theme::{apply_theme, AttributeRoot, DocumentRoot, ScriptRoot, ThemeStore, THEME_ATTRIBUTE};

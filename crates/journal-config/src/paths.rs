use std::path::PathBuf;

use journal_common::ConfigError;

const APP_NAME: &str = "vrc-journal";

/// Platform preference file path.
///
/// - macOS: `~/Library/Application Support/vrc-journal/preferences.toml`
/// - Linux: `$XDG_CONFIG_HOME/vrc-journal/preferences.toml`
/// - Windows: `%APPDATA%\vrc-journal\preferences.toml`
pub fn default_preferences_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join(APP_NAME).join("preferences.toml"))
}

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("preference file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("preference parse error: {0}")]
    ParseError(String),

    #[error("preference write error: {0}")]
    WriteError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("locale query failed: {0}")]
    LocaleUnavailable(String),
}

/// Failure of a call to, or a message from, the backend process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("{command} failed: {message}")]
    Call { command: String, message: String },

    #[error("malformed backend payload: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn call(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Call {
            command: command.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

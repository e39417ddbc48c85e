use thiserror::Error;

/// Top-level error for detector operations.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("recording sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("notification delivery error: {0}")]
    Notify(#[from] NotifyError),
}

/// Malformed runtime overrides or unloadable global configuration.
///
/// The only failure a caller of the lifecycle API can observe at session
/// start; everything after resolution is contained per-frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("detection already active for session {0}")]
    AlreadyActive(String),

    #[error("no active detection for session {0}")]
    NotFound(String),
}

/// Recording start/stop failures reported by the host sink. Never fatal to
/// detection; the session keeps classifying frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("failed to start recording {path}: {reason}")]
    StartFailed { path: String, reason: String },

    #[error("failed to stop recording for session {session_id}: {reason}")]
    StopFailed { session_id: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification request timed out")]
    Timeout,

    #[error("notification endpoint returned HTTP {0}")]
    Status(u16),

    #[error("notification transport error: {0}")]
    Transport(String),
}

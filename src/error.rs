//! Error types and handling for Perfwatch

use thiserror::Error;

/// Result type alias for Perfwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories used to decide how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Metrics provider or memory introspection failed; the tick is skipped
    CollectionFailure,
    /// Cache clear, GC request or connection cleanup failed
    RemediationFailure,
    /// Configuration could not be loaded or is nonsensical
    ConfigValidationFailure,
    /// Anything else (panicked task, serialization)
    Internal,
}

/// Perfwatch error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Remediation error: {0}")]
    Remediation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

impl Error {
    /// Map this error onto the monitor's failure taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Collection(_) | Self::Timeout(_) | Self::Platform(_) => {
                ErrorCategory::CollectionFailure
            }
            Self::Remediation(_) => ErrorCategory::RemediationFailure,
            Self::Config(_) => ErrorCategory::ConfigValidationFailure,
            Self::Io(_) | Self::Serialization(_) | Self::TaskPanicked(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(format!("TOML error: {}", err))
    }
}

/// Render a caught panic payload as a message
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

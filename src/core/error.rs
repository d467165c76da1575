//! Structured error handling for the orchestration engine
//!
//! Provides the error taxonomy shared by the registry, the selection
//! strategy, the fallback executor and the backend interface.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with TtsError
pub type Result<T> = std::result::Result<T, TtsError>;

/// Lifecycle operation that failed on a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Initialize,
    Cleanup,
    HealthCheck,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleOperation::Initialize => write!(f, "initialize"),
            LifecycleOperation::Cleanup => write!(f, "cleanup"),
            LifecycleOperation::HealthCheck => write!(f, "health check"),
        }
    }
}

/// Main error type for the orchestrator
#[derive(Error, Debug, Clone)]
pub enum TtsError {
    /// A backend with this name is already registered
    #[error("Backend '{name}' is already registered")]
    DuplicateName { name: String },

    /// Registry lookup failed
    #[error("Backend '{name}' is not registered")]
    NotFound { name: String },

    /// A name in a fallback chain does not resolve to a registered backend
    #[error("Backend '{name}' in fallback chain does not exist")]
    BackendNotFound { name: String },

    /// Selection was asked to choose from an empty set
    #[error("No backends available")]
    NoBackendsAvailable,

    /// Every candidate was rejected by the suitability filter
    #[error("No suitable backends found among {considered} considered")]
    NoSuitableBackends { considered: usize },

    /// The whole fallback chain failed; carries the most recent cause
    #[error("All backends failed for request {request_id} (last: {last_backend}, attempted: {attempted})")]
    AllBackendsFailed {
        request_id: String,
        last_backend: String,
        attempted: usize,
        #[source]
        source: Box<TtsError>,
    },

    /// Backend lifecycle failure
    #[error("Backend '{backend}' failed to {operation}: {message}")]
    Initialization {
        backend: String,
        operation: LifecycleOperation,
        message: String,
    },

    /// Voice or criteria validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A backend failed to synthesize
    #[error("Synthesis failed on '{backend}': {message}")]
    Synthesis {
        backend: String,
        message: String,
        recoverable: bool,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Internal/bug errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: Option<String>,
    },
}

impl TtsError {
    /// Create a synthesis failure for a backend
    pub fn synthesis(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Synthesis {
            backend: backend.into(),
            message: message.into(),
            recoverable: true,
        }
    }

    /// Create a validation error for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an error for a poisoned lock
    pub fn lock_poisoned(location: &str) -> Self {
        Self::Internal {
            message: "Failed to acquire lock".to_string(),
            location: Some(location.to_string()),
        }
    }

    /// Whether retrying the same request later may succeed
    ///
    /// A classification for callers. The fallback executor tries every
    /// backend in the chain regardless and only logs this flag.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Synthesis { recoverable, .. } => *recoverable,
            Self::Initialization { .. } | Self::Io { .. } | Self::Internal { .. } => true,
            Self::DuplicateName { .. }
            | Self::Validation { .. }
            | Self::NotFound { .. }
            | Self::BackendNotFound { .. }
            | Self::NoBackendsAvailable
            | Self::NoSuitableBackends { .. }
            | Self::AllBackendsFailed { .. }
            | Self::Config { .. } => false,
        }
    }

    /// Innermost cause for wrapped errors
    pub fn root_cause(&self) -> &TtsError {
        match self {
            Self::AllBackendsFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for TtsError {
    fn from(err: anyhow::Error) -> Self {
        TtsError::Internal {
            message: err.to_string(),
            location: None,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for TtsError {
    fn from(err: serde_yaml::Error) -> Self {
        TtsError::Config {
            message: format!("Invalid YAML: {}", err),
            path: None,
        }
    }
}

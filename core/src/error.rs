//! Structured error types for Garden
//!
//! Every failure the core can surface is recoverable by the caller. Errors
//! coming from collaborators (the provider transport, file parsing) keep their
//! original message and carry an [`ErrorKind`] so hosts can react per kind.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for Garden operations
#[derive(Error, Debug)]
pub enum GardenError {
    // =========================================================================
    // Session / Provider Errors
    // =========================================================================
    /// No provider credential available for an outbound call
    #[error("no provider credential configured")]
    CredentialMissing,

    /// Provider returned a non-2xx status or the request never completed
    #[error("provider request failed{}: {message}", status_label(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    // =========================================================================
    // Import Errors
    // =========================================================================
    /// The imported file produced zero usable rows
    #[error("no valid test cases found in the file")]
    EmptyDataset,

    /// Fewer rows than requested for training
    #[error("file contains {available} test cases, but {requested} were requested for training")]
    InsufficientData { available: usize, requested: usize },

    /// The file could not be parsed in the declared format
    #[error("failed to parse input: {message}")]
    Parse { message: String },

    // =========================================================================
    // State Machine Errors
    // =========================================================================
    /// Operation not permitted in the current engine/session state
    #[error("invalid state: {description}")]
    InvalidState { description: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Coarse classification attached to every [`GardenError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialMissing,
    Transport,
    EmptyDataset,
    InsufficientData,
    InvalidState,
    Parse,
    Config,
    Io,
    Internal,
}

impl GardenError {
    /// Shorthand for an [`GardenError::InvalidState`]
    pub fn invalid_state(description: impl Into<String>) -> Self {
        Self::InvalidState {
            description: description.into(),
        }
    }

    /// Shorthand for a [`GardenError::Parse`]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialMissing => ErrorKind::CredentialMissing,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::EmptyDataset => ErrorKind::EmptyDataset,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Config { .. } | Self::FileNotFound { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Template(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Check if the caller may reasonably retry the failed operation.
    ///
    /// The core never retries on its own; this is advisory for hosts.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Check if error requires user action
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing
                | Self::Transport {
                    status: Some(401 | 403),
                    ..
                }
                | Self::EmptyDataset
                | Self::InsufficientData { .. }
                | Self::Config { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::CredentialMissing => {
                "API key required. Set one with `garden config set-key` or the MISTRAL_API_KEY environment variable.".to_string()
            }
            Self::Transport {
                status: Some(401 | 403),
                ..
            } => "Authentication failed. Please check your API key.".to_string(),
            Self::Transport { .. } => {
                "Failed to get a response from the model provider. Please try again.".to_string()
            }
            Self::InsufficientData {
                available,
                requested,
            } => format!(
                "Not enough data: the file contains {} test cases, but you requested {} for training.",
                available, requested
            ),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for GardenError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<csv::Error> for GardenError {
    fn from(err: csv::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<tera::Error> for GardenError {
    fn from(err: tera::Error) -> Self {
        // tera nests the useful detail in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self::Template(message)
    }
}

impl From<toml::de::Error> for GardenError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for GardenError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using GardenError
pub type Result<T> = std::result::Result<T, GardenError>;

/// Extension trait for converting Option to Result with GardenError
pub trait OptionExt<T> {
    fn ok_or_invalid_state(self, description: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_state(self, description: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| GardenError::invalid_state(description))
    }
}

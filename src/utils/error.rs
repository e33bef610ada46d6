//! Centralized error types and conversions for confab
//!
//! This module provides structured error types using `thiserror` for library code.
//! CLI/main modules should use `anyhow` for easy context.

use thiserror::Error;

use crate::providers::ProviderError;

/// Error type for every session operation
#[derive(Error, Debug)]
pub enum ConfabError {
    /// Missing or malformed request fields
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Unknown session or persona
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation does not apply in the current state (e.g. terminated session)
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The completion endpoint could not be reached
    #[error("Completion endpoint unreachable: {message}")]
    Transport { message: String },

    /// The completion endpoint answered with a failure status
    #[error("Completion endpoint returned status {status}")]
    Upstream { status: u16, body: String },

    /// The completion endpoint answered with an unreadable body
    #[error("Completion response could not be decoded: {message}")]
    Decode { message: String },

    /// Storage read or write failure
    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    /// Invalid or missing settings
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ConfabError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Session",
            id: id.into(),
        }
    }

    pub fn persona_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Persona",
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Conflict raised for any mutation of a finished conversation
    pub fn terminated(session_id: &str) -> Self {
        Self::conflict(format!("session {} has already been terminated", session_id))
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the caller sent something that can never succeed as-is
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConfabError::Validation { .. } | ConfabError::NotFound { .. } | ConfabError::Conflict { .. }
        )
    }

    /// Returns true if the failure came from the completion endpoint
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ConfabError::Transport { .. } | ConfabError::Upstream { .. } | ConfabError::Decode { .. }
        )
    }
}

/// Result type alias using ConfabError
pub type Result<T> = std::result::Result<T, ConfabError>;

impl From<ProviderError> for ConfabError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport { message } => Self::Transport { message },
            ProviderError::Upstream { status, body } => Self::Upstream { status, body },
            ProviderError::Decode { message } => Self::Decode { message },
            ProviderError::Config { message } => Self::Config { message },
        }
    }
}

impl From<sqlx::Error> for ConfabError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence {
            message: err.to_string(),
        }
    }
}

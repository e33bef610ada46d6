//! Error types for completion calls
//!
//! Failures are split three ways so callers can tell a dead network from an
//! upstream refusal from a garbled body. None of them are retried here.

use thiserror::Error;

/// Errors that can occur when calling the completion endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network failure or timeout before a response arrived
    #[error("Transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// The endpoint answered with a non-success status
    #[error("Upstream returned status {status}: {body}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The response body could not be interpreted
    #[error("Decode error: {message}")]
    Decode {
        /// Error message
        message: String,
    },

    /// The client could not be constructed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

impl ProviderError {
    /// Creates a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates the transport error reported when a call exceeds its timeout
    pub fn timeout(seconds: u64) -> Self {
        Self::Transport {
            message: format!("request timed out after {} seconds", seconds),
        }
    }

    /// Creates an upstream status error
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Creates a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if no response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport { .. })
    }

    /// Returns the upstream status code, if the endpoint answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::transport(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::transport(format!("request failed: {}", err))
        }
    }
}

/// Result type for completion calls
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transport() {
        let err = ProviderError::timeout(15);
        assert!(err.is_transport());
        assert!(err.to_string().contains("15 seconds"));
    }

    #[test]
    fn test_upstream_carries_status_and_body() {
        let err = ProviderError::upstream(401, "{\"error\":\"bad key\"}");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_transport());
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: ProviderError = json_err.into();
        assert!(matches!(err, ProviderError::Decode { .. }));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_error_display_messages() {
        assert!(
            ProviderError::transport("refused")
                .to_string()
                .contains("Transport error")
        );
        assert!(ProviderError::decode("eof").to_string().contains("Decode"));
        assert!(
            ProviderError::config("no key")
                .to_string()
                .contains("Configuration")
        );
    }
}

//! Error types for the megaverse client.
//!
//! The taxonomy separates failures by what the caller should do next:
//! validation errors are never retried, transport/server/rate-limit errors
//! are retried with backoff, other client errors are surfaced immediately,
//! and cancellation aborts the remaining work.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for megaverse operations.
pub type MegaverseResult<T> = Result<T, MegaverseError>;

/// Error type for megaverse client operations.
#[derive(Debug, Clone, Error)]
pub enum MegaverseError {
    /// Configuration error (missing candidate id, bad base URL, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// An operation's own attributes are invalid. Never retried.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
        /// The offending field, if known.
        field: Option<String>,
    },

    /// Network/connection error.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// The call timed out before a response arrived.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// The remote side signalled that its rate budget was exceeded (HTTP 429).
    #[error("Rate limited on {endpoint}: {message}")]
    RateLimited {
        /// Error message.
        message: String,
        /// Endpoint that was called.
        endpoint: String,
    },

    /// Server error (5xx status codes).
    #[error("Server error (HTTP {status_code}) on {endpoint}: {message}")]
    Server {
        /// HTTP status code.
        status_code: u16,
        /// Error message or response body.
        message: String,
        /// Endpoint that was called.
        endpoint: String,
    },

    /// Client error other than rate limiting. Retrying will not help.
    #[error("API error (HTTP {status_code}) on {endpoint}: {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message or response body.
        message: String,
        /// Endpoint that was called.
        endpoint: String,
    },

    /// The enclosing operation was cancelled or its deadline passed.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// What was interrupted.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// A plan generator could not build a plan.
    #[error("Plan error: {message}")]
    Plan {
        /// Error message.
        message: String,
    },

    /// A task ended abnormally, for example by panicking.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },

    /// One or more operations of a plan failed.
    #[error("Encountered {failed} errors while executing {attempted} operations")]
    Execution {
        /// Operations attempted.
        attempted: usize,
        /// Operations failed.
        failed: usize,
    },
}

impl MegaverseError {
    /// Returns true if re-attempting the call can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MegaverseError::Network { .. }
                | MegaverseError::Timeout { .. }
                | MegaverseError::RateLimited { .. }
                | MegaverseError::Server { .. }
        )
    }

    /// Returns true if this error signals cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MegaverseError::Cancelled { .. })
    }

    /// Returns the HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MegaverseError::RateLimited { .. } => Some(429),
            MegaverseError::Server { status_code, .. } | MegaverseError::Api { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    /// Short, stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MegaverseError::Configuration { .. } => "configuration",
            MegaverseError::Validation { .. } => "validation",
            MegaverseError::Network { .. } => "network",
            MegaverseError::Timeout { .. } => "timeout",
            MegaverseError::RateLimited { .. } => "rate_limited",
            MegaverseError::Server { .. } => "server",
            MegaverseError::Api { .. } => "api",
            MegaverseError::Cancelled { .. } => "cancelled",
            MegaverseError::Serialization { .. } => "serialization",
            MegaverseError::Plan { .. } => "plan",
            MegaverseError::Internal { .. } => "internal",
            MegaverseError::Execution { .. } => "execution",
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        MegaverseError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        MegaverseError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error naming the offending field.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        MegaverseError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        MegaverseError::Cancelled {
            message: message.into(),
        }
    }

    /// Creates a plan error.
    pub fn plan(message: impl Into<String>) -> Self {
        MegaverseError::Plan {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        MegaverseError::Internal {
            message: message.into(),
        }
    }

    /// Maps an unsuccessful HTTP status to the matching error variant.
    pub fn from_status(status_code: u16, message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let message = message.into();
        let endpoint = endpoint.into();
        match status_code {
            429 => MegaverseError::RateLimited { message, endpoint },
            500..=599 => MegaverseError::Server {
                status_code,
                message,
                endpoint,
            },
            _ => MegaverseError::Api {
                status_code,
                message,
                endpoint,
            },
        }
    }
}

/// Error body returned by the megaverse API.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Short error label.
    #[serde(default)]
    pub error: Option<String>,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Echoed status code.
    #[serde(default)]
    pub status: Option<u16>,
}

impl ApiErrorResponse {
    /// Extracts the most useful message from a raw response body.
    pub fn message_from_body(body: &[u8]) -> String {
        match serde_json::from_slice::<ApiErrorResponse>(body) {
            Ok(parsed) => parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl From<TransportError> for MegaverseError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => MegaverseError::Timeout {
                message: err.to_string(),
            },
            TransportError::Connection { .. } | TransportError::InvalidResponse { .. } => {
                MegaverseError::Network {
                    message: err.to_string(),
                }
            }
            TransportError::InvalidRequest { .. } => MegaverseError::Validation {
                message: err.to_string(),
                field: None,
            },
        }
    }
}

impl From<reqwest::Error> for MegaverseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MegaverseError::Timeout {
                message: err.to_string(),
            }
        } else {
            MegaverseError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for MegaverseError {
    fn from(err: serde_json::Error) -> Self {
        MegaverseError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for MegaverseError {
    fn from(err: url::ParseError) -> Self {
        MegaverseError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}

//! HTTP transport layer for the megaverse client.
//!
//! The resilience pipeline only depends on the [`HttpTransport`] trait, so
//! tests and callers can substitute any transport that returns a raw status.

mod http;

pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, HttpTransportImpl};

use std::time::Duration;

/// Transport error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established or was dropped.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// The response could not be read.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// The request could not be built.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },
}

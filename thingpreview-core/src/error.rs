//! Error types for the thingpreview core library
//!
//! This module provides structured error types using `thiserror`.
//!
//! # Error Hierarchy
//!
//! ```text
//! LookupError     - a batched lookup for one domain failed
//! ConfigError     - invalid THINGPREVIEW_* configuration
//! ```
//!
//! Note that [`RequestCoalescer::request`](crate::RequestCoalescer::request)
//! never returns an error: lookup failures surface as `None` delivered to the
//! request's callback.
//!
//! # Usage
//!
//! Lookup implementations return [`LookupError`]:
//!
//! ```rust,ignore
//! use thingpreview_core::error::LookupError;
//!
//! async fn fetch(url: &str) -> Result<Vec<Entity>, LookupError> {
//!     // ...
//! }
//! ```
//!
//! Application code should use `anyhow` with context.

use thiserror::Error;

use crate::key::Domain;

/// Errors returned by a [`ThingLookup`](crate::lookup::ThingLookup)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// Could not reach the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Failed to decode {domain} lookup response: {message}")]
    Decode { domain: Domain, message: String },

    #[error("{domain} lookup panicked")]
    Panicked { domain: Domain },
}

impl LookupError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status { status, body: body.into() }
    }

    /// Create a decode error
    pub fn decode(domain: Domain, msg: impl Into<String>) -> Self {
        Self::Decode { domain, message: msg.into() }
    }
}

/// Errors raised while reading configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Environment variable is set but does not parse
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },

    /// Debounce window must be positive
    #[error("Debounce window must be greater than zero")]
    ZeroWindow,
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue { var: var.into(), value: value.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_display() {
        let err = LookupError::transport("connection refused");
        assert_eq!(err.to_string(), "Transport error: connection refused");

        let err = LookupError::status(503, "unavailable");
        assert_eq!(err.to_string(), "Backend returned status 503: unavailable");

        let err = LookupError::decode(Domain::Author, "expected object");
        assert_eq!(
            err.to_string(),
            "Failed to decode author lookup response: expected object"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("THINGPREVIEW_DEBOUNCE_MS", "soon");
        assert_eq!(err.to_string(), "Invalid value for THINGPREVIEW_DEBOUNCE_MS: 'soon'");
        assert_eq!(ConfigError::ZeroWindow.to_string(), "Debounce window must be greater than zero");
    }

    #[test]
    fn test_lookup_error_helpers() {
        assert!(matches!(LookupError::transport("x"), LookupError::Transport(_)));
        assert!(matches!(LookupError::status(404, ""), LookupError::Status { status: 404, .. }));
        assert_eq!(
            LookupError::Panicked { domain: Domain::Work }.to_string(),
            "work lookup panicked"
        );
    }
}

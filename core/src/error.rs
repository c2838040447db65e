//! Error types for the Smart Dealer client.
//!
//! # Design
//! Public operations never return `Err`. Each failure is recorded as a
//! `CallError` in the `ErrorSink` of the running call and the operation returns
//! an empty result; callers inspect the errors after every call. The sink is
//! created fresh by each public operation, so errors never leak from one call
//! into the next.

use thiserror::Error;

/// One failure recorded while executing a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The requested path matches no entry of the route table.
    #[error("the {path} method is invalid; call methods() to list the available routes")]
    InvalidRoute { path: String },

    /// The reachability probe failed or outbound URL I/O is disabled.
    #[error("the REST webservice URL is not valid or the server refused this request: {reason}")]
    ServerUnreachable { reason: String },

    /// The backend could not carry out the request. Holds the backend's text.
    #[error("{0}")]
    TransportFailure(String),

    /// The response body signals rejected credentials.
    #[error("login or password is invalid, not authenticated")]
    Unauthorized,

    /// Missing or invalid transport selection, or a verb the transport lacks.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The body could not be decoded. Only recorded under strict decoding.
    #[error("could not decode response as {format}: {message}")]
    Decode { format: &'static str, message: String },
}

/// Errors raised while loading a custom route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate route pattern {0}")]
    DuplicatePattern(String),
}

/// Ordered accumulator of the errors raised during one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSink {
    errors: Vec<CallError>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CallError) {
        tracing::debug!(%error, "call error recorded");
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[CallError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CallError> {
        self.errors
    }
}

//! MCP Error Types
//!
//! This module defines the error type shared by every layer of the session:
//! envelope decoding, payload union decoding, lifecycle violations, peer
//! reported errors, cancellation and session teardown. It also carries the
//! JSON-RPC error object and the standard error codes used on the wire.

use schemars::JsonSchema;
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::protocol::envelope::DecodeError;
use crate::protocol::one_of::PayloadError;

/// Error object carried by a JSON-RPC error response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct ErrorData {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorData {
    /// Create an error object without additional data
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach additional data to the error object
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for ErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// The main Error type for the session layer
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound message was not a valid envelope
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A payload did not match any shape of its union
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Transport-related errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// A method was used out of sequence
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The peer answered with an error response
    #[error("Peer error: {0}")]
    Rpc(ErrorData),

    /// The call was cancelled locally
    #[error("Request cancelled")]
    Cancelled,

    /// The session is closed
    #[error("Session closed")]
    SessionClosed,

    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Internal errors raised by handlers
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    /// Parse error
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid request
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i64 = -32099;
    /// Server error range end
    pub const SERVER_ERROR_END: i64 = -32000;
    /// The connection was closed before the request completed
    pub const CONNECTION_CLOSED: i64 = -32000;
    /// Request timeout
    pub const REQUEST_TIMEOUT: i64 = -32001;
}

impl Error {
    /// Convert an error to a JSON-RPC error code
    pub fn to_code(&self) -> i64 {
        use error_codes::*;
        match self {
            Error::Json(_) => PARSE_ERROR,
            Error::Decode(DecodeError::Json(_)) => PARSE_ERROR,
            Error::Decode(_) => INVALID_REQUEST,
            Error::Payload(_) => INVALID_PARAMS,
            Error::Protocol(_) => INVALID_REQUEST,
            Error::MethodNotFound(_) => METHOD_NOT_FOUND,
            Error::InvalidParams(_) => INVALID_PARAMS,
            Error::Rpc(data) => data.code,
            Error::SessionClosed => CONNECTION_CLOSED,
            Error::Timeout(_) => REQUEST_TIMEOUT,
            Error::Cancelled => INTERNAL_ERROR,
            Error::Io(_) => INTERNAL_ERROR,
            Error::Transport(_) => INTERNAL_ERROR,
            Error::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Create the wire error object for this error
    ///
    /// A peer-reported error is passed through unchanged so that relaying it
    /// keeps the original code and data.
    pub fn to_error_data(&self) -> ErrorData {
        match self {
            Error::Rpc(data) => data.clone(),
            other => ErrorData::new(other.to_code(), other.to_string()),
        }
    }

    /// Whether this error means the session can no longer be used
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Error::SessionClosed)
    }
}

impl From<ErrorData> for Error {
    fn from(data: ErrorData) -> Self {
        Error::Rpc(data)
    }
}

// Manual implementation of Clone that handles non-cloneable types
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Json(e) => Error::Transport(format!("JSON error: {}", e)),
            Error::Io(e) => Error::Transport(format!("I/O error: {}", e)),
            Error::Decode(e) => Error::Decode(e.clone()),
            Error::Payload(e) => Error::Payload(e.clone()),
            Error::Transport(s) => Error::Transport(s.clone()),
            Error::Protocol(s) => Error::Protocol(s.clone()),
            Error::MethodNotFound(s) => Error::MethodNotFound(s.clone()),
            Error::InvalidParams(s) => Error::InvalidParams(s.clone()),
            Error::Rpc(data) => Error::Rpc(data.clone()),
            Error::Cancelled => Error::Cancelled,
            Error::SessionClosed => Error::SessionClosed,
            Error::Timeout(s) => Error::Timeout(s.clone()),
            Error::Internal(s) => Error::Internal(s.clone()),
        }
    }
}

//! Error types and handling
//!
//! Common error types used across the session controller.

use crate::media::StreamId;
use crate::signaling::TransportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the platform capture API.
///
/// Platforms distinguish these, the session does not: every variant is
/// collapsed into [`SessionError::CaptureFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Constraints cannot be satisfied: {0}")]
    Overconstrained(String),

    #[error("Not supported: {0}")]
    Unsupported(String),
}

/// User roster errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("Duplicate user id: {0}")]
    DuplicateUser(String),

    #[error("Unknown user id: {0}")]
    UnknownUser(String),

    #[error("Inconsistent user name for {0}")]
    InconsistentName(String),
}

/// Session-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Duplicate stream id: {0}")]
    DuplicateId(StreamId),

    #[error("Capture failed: {0}")]
    CaptureFailed(#[from] CaptureError),

    #[error("Negotiation error on {id}: {message}")]
    NegotiationError { id: StreamId, message: String },

    #[error("Unknown stream: {0}")]
    UnknownRecord(StreamId),

    #[error("Not connected")]
    NotConnected,

    #[error("Signaling failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error response for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        let code = match &error {
            SessionError::DuplicateId(_) => "DUPLICATE_ID",
            SessionError::CaptureFailed(_) => "CAPTURE_FAILED",
            SessionError::NegotiationError { .. } => "NEGOTIATION_ERROR",
            SessionError::UnknownRecord(_) => "UNKNOWN_RECORD",
            SessionError::NotConnected => "NOT_CONNECTED",
            SessionError::Transport(_) => "TRANSPORT_ERROR",
            SessionError::Roster(_) => "ROSTER_ERROR",
            SessionError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

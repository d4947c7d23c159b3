//! Shared utilities

pub mod error;

pub use error::{CaptureError, ErrorResponse, RosterError, SessionError, SessionResult};

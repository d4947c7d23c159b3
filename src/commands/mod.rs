//! UI command handlers
//!
//! Entry points the user interface binds its buttons and settings panel to.
//! Failures are returned as [`ErrorResponse`](crate::utils::ErrorResponse).

pub mod media;
pub mod settings;

pub use media::MediaCommands;

//! Conference media - client-side media session controller.
//!
//! This is the main library crate. It keeps track of every stream the
//! client sends and receives, coordinates camera/microphone, screen and
//! file capture, caps outgoing bandwidth and detects who is speaking.
//! Signaling, rendering and platform capture are plugged in through the
//! traits in [`signaling`], [`render`] and [`capture`].

pub mod capture;
pub mod commands;
pub mod config;
pub mod media;
pub mod policy;
pub mod render;
pub mod session;
pub mod settings;
pub mod signaling;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use session::{Session, SessionEvent};
pub use settings::Settings;
pub use utils::{ErrorResponse, SessionError, SessionResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to debug output for this
/// crate. Calling it again once a subscriber is installed does nothing.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conference_media=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Conference media v{}", env!("CARGO_PKG_VERSION"));
    }
}

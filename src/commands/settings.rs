//! Settings panel handlers
//!
//! Every change is stored first, then applied to the running session.

use crate::media::StreamId;
use crate::session::Session;
use crate::settings::Settings;
use crate::utils::ErrorResponse;

/// Current settings, for populating the panel
pub fn get_settings(session: &Session) -> Settings {
    session.settings()
}

/// Flip the microphone mute. Returns the new state.
pub fn toggle_mute(session: &Session) -> bool {
    let mute = !session.settings().local_mute;
    session.set_local_mute(mute);
    mute
}

/// Select a camera (`None` for no camera) and re-capture the presentation
pub async fn select_video(
    session: &Session,
    device_id: Option<String>,
) -> Result<Option<StreamId>, ErrorResponse> {
    tracing::info!("Camera selected: {:?}", device_id);
    session.settings_store().update(|s| s.video = device_id);
    Ok(session.change_presentation().await?)
}

/// Select a microphone (`None` for no microphone) and re-capture the
/// presentation
pub async fn select_audio(
    session: &Session,
    device_id: Option<String>,
) -> Result<Option<StreamId>, ErrorResponse> {
    tracing::info!("Microphone selected: {:?}", device_id);
    session.settings_store().update(|s| s.audio = device_id);
    Ok(session.change_presentation().await?)
}

pub async fn set_blackboard(
    session: &Session,
    enabled: bool,
) -> Result<Option<StreamId>, ErrorResponse> {
    tracing::info!("Blackboard mode {}", if enabled { "on" } else { "off" });
    session.settings_store().update(|s| s.blackboard_mode = enabled);
    Ok(session.change_presentation().await?)
}

/// Send quality: `lowest`, `low`, `normal` or `unlimited`
pub async fn select_send(session: &Session, tier: &str) {
    session.set_quality_tier(tier).await;
}

/// Receive tier, forwarded to the server
pub fn select_request(session: &Session, tier: &str) -> Result<(), ErrorResponse> {
    Ok(session.set_request_tier(tier)?)
}

pub fn set_activity_detection(session: &Session, enabled: bool) {
    session.set_activity_detection_enabled(enabled);
}

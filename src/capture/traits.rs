//! Capture trait definitions
//!
//! Platform-agnostic interface to camera, microphone, screen and file
//! capture. Every capture call may suspend and may fail.

use crate::media::TrackRef;
use crate::render::MediaElement;
use crate::settings::Settings;
use crate::utils::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Minimum and preferred size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: u32,
    pub ideal: u32,
}

/// Blackboard mode width
pub const BLACKBOARD_WIDTH: SizeRange = SizeRange { min: 640, ideal: 1920 };

/// Blackboard mode height
pub const BLACKBOARD_HEIGHT: SizeRange = SizeRange { min: 400, ideal: 1080 };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub device_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<SizeRange>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<SizeRange>,
}

/// Camera/microphone request. An absent side is not captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    /// Constraints for the devices selected in `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        let audio = settings
            .audio
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| AudioConstraints { device_id: id.clone() });

        let video = settings
            .video
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| {
                let (width, height) = if settings.blackboard_mode {
                    (Some(BLACKBOARD_WIDTH), Some(BLACKBOARD_HEIGHT))
                } else {
                    (None, None)
                };
                VideoConstraints {
                    device_id: id.clone(),
                    width,
                    height,
                }
            });

        Self { audio, video }
    }

    /// Nothing to capture
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

/// Kind of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// Information about a capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Unique device ID
    pub device_id: String,

    pub kind: DeviceKind,

    /// Human readable name; may be empty before permission is granted
    pub label: String,
}

/// A local media file to play into the conference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    pub path: PathBuf,
}

/// Track changes reported by a live capture source
#[derive(Debug, Clone)]
pub enum TrackEvent {
    /// A track appeared on the source (file playback)
    Added(TrackRef),
    /// A track left the source
    Removed(String),
    /// The platform ended a track (user stopped sharing)
    Ended(String),
}

/// Result of a capture call
#[derive(Debug)]
pub struct CapturedMedia {
    /// Tracks available immediately
    pub tracks: Vec<TrackRef>,

    /// Later track changes, for sources that have them
    pub events: Option<mpsc::UnboundedReceiver<TrackEvent>>,

    /// Element the platform already plays the media in
    pub element: Option<MediaElement>,
}

impl CapturedMedia {
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self {
            tracks,
            events: None,
            element: None,
        }
    }
}

/// Platform capture API
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera and/or microphone
    async fn get_user_media(&self, constraints: &MediaConstraints)
        -> Result<CapturedMedia, CaptureError>;

    /// Screen or window, chosen by the user through the platform picker
    async fn get_display_media(&self) -> Result<CapturedMedia, CaptureError>;

    /// Start playback of a file; tracks usually arrive later as events
    async fn capture_file(&self, file: &MediaFile) -> Result<CapturedMedia, CaptureError>;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    fn supports_display_capture(&self) -> bool;
}

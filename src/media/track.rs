//! Media tracks and the streams that own them

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Kind of a raw media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Semantic label attached to a track of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackLabel {
    Audio,
    Video,
    Screenshare,
}

impl From<TrackKind> for TrackLabel {
    fn from(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => TrackLabel::Audio,
            TrackKind::Video => TrackLabel::Video,
        }
    }
}

/// Encoder hint for video content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentHint {
    /// Favour sharpness over motion (blackboard mode)
    Detail,
}

/// A platform media track.
///
/// Implementations wrap whatever the platform hands out. `stop` must be
/// idempotent and must not fail; hardware that is already gone is ignored.
pub trait MediaTrack: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn set_content_hint(&self, hint: ContentHint);

    fn stop(&self);
}

pub type TrackRef = Arc<dyn MediaTrack>;

/// The set of tracks carried by one record
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<TrackRef>,
}

impl MediaStream {
    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackRef> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackRef> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn track(&self, id: &str) -> Option<&TrackRef> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn add(&mut self, track: TrackRef) {
        if self.track(track.id()).is_none() {
            self.tracks.push(track);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<TrackRef> {
        let pos = self.tracks.iter().position(|t| t.id() == id)?;
        Some(self.tracks.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Stop every track. Tracks stay in the stream so a replacement
    /// capture can still find the record they belonged to.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

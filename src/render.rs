//! Rendering capability
//!
//! The session tells the rendering layer what changed; it never asks it
//! anything back. Implementations must not call into the session from
//! inside these methods.

use crate::media::{StreamId, StreamKind};
use serde::{Deserialize, Serialize};

/// Direction of a stream relative to this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// A platform media element supplied by the capture layer (file playback).
/// When absent the renderer creates its own element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaElement {
    pub id: String,
}

/// What the renderer needs to build or refresh a tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub direction: Direction,
    pub kind: StreamKind,
    pub element: Option<MediaElement>,
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Error,
    Warning,
    Info,
}

/// Visibility of the media controls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub present: bool,
    pub unpresent: bool,
    pub share: bool,
    pub unshare: bool,
    pub stop_file: bool,
    pub media_options: bool,
}

pub trait Renderer: Send + Sync {
    /// Create the tile for `id`, or rebind it if it already exists
    fn attach(&self, id: &StreamId, tile: &Tile);

    fn detach(&self, id: &StreamId);

    /// Set the tile caption. `fallback` marks computed text (rates) as
    /// opposed to a real label.
    fn set_label(&self, id: &StreamId, text: &str, fallback: bool);

    fn set_status(&self, id: &StreamId, healthy: bool);

    /// Toggle the speaking indicator
    fn set_active(&self, id: &StreamId, active: bool);

    fn recompute_layout(&self);

    /// Dismissible user-facing notification
    fn notify(&self, level: NotifyLevel, message: &str);

    fn set_controls(&self, controls: &Controls);
}

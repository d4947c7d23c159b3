//! Stream records
//!
//! A record describes one media stream, local or remote, together with the
//! resources it exclusively owns: its tracks, its negotiation handle, its
//! statistics poller and the background tasks feeding it events.

use super::stats::StatsPoller;
use super::track::{MediaStream, TrackLabel, TrackRef};
use crate::render::{Direction, MediaElement, Tile};
use crate::signaling::NegotiationHandle;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Opaque stream identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Fresh random identifier
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Camera and/or microphone
    Local,
    Screenshare,
    /// Playback of a local media file
    File,
    /// Received from the server
    Remote,
}

impl StreamKind {
    pub fn direction(self) -> Direction {
        match self {
            StreamKind::Remote => Direction::Down,
            _ => Direction::Up,
        }
    }
}

/// Voice activity bookkeeping for downstream records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityState {
    pub active: bool,
    pub last_voice_activity: Option<Instant>,
}

pub struct StreamRecord {
    id: StreamId,
    kind: StreamKind,
    stream: MediaStream,
    labels: HashMap<String, TrackLabel>,
    handle: Arc<dyn NegotiationHandle>,
    element: Option<MediaElement>,
    stats: Option<StatsPoller>,
    tasks: Vec<JoinHandle<()>>,
    /// Scratch state owned by the activity detector
    pub activity: ActivityState,
    bitrate_applied: bool,
    created_at: DateTime<Utc>,
    pub(crate) seq: u64,
}

impl StreamRecord {
    pub fn new(id: StreamId, kind: StreamKind, handle: Arc<dyn NegotiationHandle>) -> Self {
        Self {
            id,
            kind,
            stream: MediaStream::default(),
            labels: HashMap::new(),
            handle,
            element: None,
            stats: None,
            tasks: Vec::new(),
            activity: ActivityState::default(),
            bitrate_applied: false,
            created_at: Utc::now(),
            seq: 0,
        }
    }

    pub fn with_element(mut self, element: MediaElement) -> Self {
        self.element = Some(element);
        self
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn handle(&self) -> &Arc<dyn NegotiationHandle> {
        &self.handle
    }

    pub fn labels(&self) -> &HashMap<String, TrackLabel> {
        &self.labels
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the record was created
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    pub fn tile(&self) -> Tile {
        Tile {
            direction: self.direction(),
            kind: self.kind,
            element: self.element.clone(),
        }
    }

    /// Add a track to the stream under a semantic label
    pub fn add_track(&mut self, track: TrackRef, label: TrackLabel) {
        self.labels.insert(track.id().to_string(), label);
        self.stream.add(track);
    }

    /// Drop a track and its label. Returns the remaining label count.
    pub fn remove_track(&mut self, track_id: &str) -> usize {
        self.labels.remove(track_id);
        self.stream.remove(track_id);
        self.labels.len()
    }

    /// Current statistics period, 0 when sampling is off
    pub fn stats_interval_ms(&self) -> u64 {
        self.stats.as_ref().map(|p| p.interval_ms()).unwrap_or(0)
    }

    /// Replace the statistics poller; `None` stops sampling
    pub fn set_stats_poller(&mut self, poller: Option<StatsPoller>) {
        self.stats = poller;
    }

    /// Keep a background task alive for as long as the record exists
    pub fn attach_task(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Returns `true` the first time it is called
    pub fn mark_bitrate_applied(&mut self) -> bool {
        !std::mem::replace(&mut self.bitrate_applied, true)
    }

    /// Stop all tracks but keep the record
    pub fn stop_tracks(&self) {
        self.stream.stop();
    }

    /// Release everything the record owns
    pub fn release(mut self) {
        self.stats = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.stream.stop();
        self.handle.close();
        tracing::debug!(
            "Released {:?} stream {} after {}s",
            self.kind,
            self.id,
            self.age().num_seconds()
        );
    }
}

impl fmt::Debug for StreamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("tracks", &self.stream.len())
            .field("labels", &self.labels)
            .field("stats_interval_ms", &self.stats_interval_ms())
            .field("activity", &self.activity)
            .field("created_at", &self.created_at.to_rfc3339())
            .finish()
    }
}

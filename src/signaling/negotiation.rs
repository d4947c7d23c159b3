//! Negotiation handles
//!
//! A negotiation handle is the transport object that carries the media of
//! exactly one record (a peer connection and its transceivers). The session
//! never looks inside; it only uses the operations below.

use crate::media::{StatsReport, TrackKind, TrackRef};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level failure reported by a handle or sender
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// ICE connection state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceConnectionState {
    /// Whether media is flowing
    pub fn is_healthy(self) -> bool {
        matches!(self, IceConnectionState::Connected | IceConnectionState::Completed)
    }
}

/// Encoding parameters of one sender layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingParameters {
    /// Maximum send bitrate, `None` when uncapped
    pub max_bitrate: Option<u32>,
}

/// Parameters of a sender
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendParameters {
    pub encodings: Vec<EncodingParameters>,
}

/// One outgoing track slot of a handle
#[async_trait]
pub trait RtpSender: Send + Sync {
    /// Id of the attached track, if any
    fn track_id(&self) -> Option<String>;

    fn track_kind(&self) -> Option<TrackKind>;

    fn parameters(&self) -> SendParameters;

    async fn set_parameters(&self, params: SendParameters) -> Result<(), TransportError>;
}

/// One incoming track of a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverInfo {
    pub track_id: String,
    pub kind: TrackKind,
}

/// Transport carrying the media of a single record
#[async_trait]
pub trait NegotiationHandle: Send + Sync {
    fn add_track(&self, track: &TrackRef) -> Result<(), TransportError>;

    /// Remove the sender carrying `track_id`. Returns `false` when no
    /// sender carries that track.
    fn remove_track(&self, track_id: &str) -> bool;

    fn senders(&self) -> Vec<Arc<dyn RtpSender>>;

    fn receivers(&self) -> Vec<ReceiverInfo>;

    fn ice_state(&self) -> IceConnectionState;

    /// Label announced by the remote side (usually the user name)
    fn label(&self) -> Option<String>;

    async fn stats(&self) -> Result<StatsReport, TransportError>;

    /// Release the transport. Must be idempotent and infallible.
    fn close(&self);
}

/// Events raised by a handle over its lifetime
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationEvent {
    /// ICE state changed; read the new state from the handle
    StatusChanged,
    LabelChanged(Option<String>),
    Error(String),
    /// Server refused or aborted the stream
    Abort,
    NegotiationCompleted,
    /// A remote track arrived
    DownTrack { track_id: String, kind: TrackKind },
    /// Remote side closed the stream
    Closed,
}

/// A handle together with the channel its events arrive on
pub struct Negotiation {
    pub handle: Arc<dyn NegotiationHandle>,
    pub events: mpsc::UnboundedReceiver<NegotiationEvent>,
}

impl Negotiation {
    pub fn new(
        handle: Arc<dyn NegotiationHandle>,
        events: mpsc::UnboundedReceiver<NegotiationEvent>,
    ) -> Self {
        Self { handle, events }
    }
}

impl std::fmt::Debug for Negotiation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiation").finish_non_exhaustive()
    }
}

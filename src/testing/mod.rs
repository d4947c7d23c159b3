//! Recording mocks of the session's collaborators

use crate::config::SessionConfig;
use crate::session::Session;
use crate::settings::Settings;
use crate::capture::{
    CapturedMedia, DeviceInfo, MediaConstraints, MediaDevices, MediaFile, TrackEvent,
};
use crate::media::{ContentHint, MediaTrack, StatsReport, StreamId, TrackKind, TrackRef};
use crate::render::{Controls, MediaElement, NotifyLevel, Renderer, Tile};
use crate::signaling::{
    EncodingParameters, IceConnectionState, Negotiation, NegotiationEvent, NegotiationHandle,
    ReceiverInfo, RtpSender, SendParameters, SessionClient, TransportError,
};
use crate::utils::CaptureError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

// ---- tracks ----

#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    hint: Mutex<Option<ContentHint>>,
}

impl MockTrack {
    pub fn new(id: &str, kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            hint: Mutex::new(None),
        })
    }

    pub fn audio(id: &str) -> Arc<Self> {
        Self::new(id, TrackKind::Audio)
    }

    pub fn video(id: &str) -> Arc<Self> {
        Self::new(id, TrackKind::Video)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn hint(&self) -> Option<ContentHint> {
        *self.hint.lock()
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_content_hint(&self, hint: ContentHint) {
        *self.hint.lock() = Some(hint);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ---- senders and handles ----

pub struct MockSender {
    track: Option<(String, TrackKind)>,
    params: Mutex<SendParameters>,
    fail: bool,
    set_calls: AtomicUsize,
    applied: Mutex<Vec<SendParameters>>,
}

impl MockSender {
    pub fn new(track_id: &str, kind: TrackKind) -> Self {
        Self {
            track: Some((track_id.to_string(), kind)),
            params: Mutex::new(SendParameters::default()),
            fail: false,
            set_calls: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn with_encoding(track_id: &str, kind: TrackKind, max_bitrate: Option<u32>) -> Self {
        let sender = Self::new(track_id, kind);
        *sender.params.lock() = SendParameters {
            encodings: vec![EncodingParameters { max_bitrate }],
        };
        sender
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn set_count(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Caps of the last successfully applied parameters
    pub fn max_bitrates(&self) -> Vec<Option<u32>> {
        self.applied
            .lock()
            .last()
            .map(|p| p.encodings.iter().map(|e| e.max_bitrate).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RtpSender for MockSender {
    fn track_id(&self) -> Option<String> {
        self.track.as_ref().map(|(id, _)| id.clone())
    }

    fn track_kind(&self) -> Option<TrackKind> {
        self.track.as_ref().map(|(_, kind)| *kind)
    }

    fn parameters(&self) -> SendParameters {
        self.params.lock().clone()
    }

    async fn set_parameters(&self, params: SendParameters) -> Result<(), TransportError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TransportError::new("sender rejected parameters"));
        }
        *self.params.lock() = params.clone();
        self.applied.lock().push(params);
        Ok(())
    }
}

pub struct MockHandle {
    senders: Mutex<Vec<Arc<MockSender>>>,
    receivers: Mutex<Vec<ReceiverInfo>>,
    ice: Mutex<IceConnectionState>,
    label: Mutex<Option<String>>,
    stats: Mutex<StatsReport>,
    stats_calls: AtomicUsize,
    closed: AtomicUsize,
}

impl MockHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: Mutex::new(Vec::new()),
            receivers: Mutex::new(Vec::new()),
            ice: Mutex::new(IceConnectionState::New),
            label: Mutex::new(None),
            stats: Mutex::new(StatsReport::default()),
            stats_calls: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    pub fn push_sender(&self, sender: MockSender) -> Arc<MockSender> {
        let sender = Arc::new(sender);
        self.senders.lock().push(sender.clone());
        sender
    }

    pub fn mock_senders(&self) -> Vec<Arc<MockSender>> {
        self.senders.lock().clone()
    }

    pub fn sender_track_ids(&self) -> Vec<String> {
        self.senders.lock().iter().filter_map(|s| s.track_id()).collect()
    }

    pub fn add_receiver(&self, track_id: &str, kind: TrackKind) {
        self.receivers.lock().push(ReceiverInfo {
            track_id: track_id.to_string(),
            kind,
        });
    }

    pub fn set_ice_state(&self, state: IceConnectionState) {
        *self.ice.lock() = state;
    }

    pub fn set_label(&self, label: Option<&str>) {
        *self.label.lock() = label.map(str::to_string);
    }

    pub fn set_stats(&self, report: StatsReport) {
        *self.stats.lock() = report;
    }

    pub fn stats_count(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NegotiationHandle for MockHandle {
    fn add_track(&self, track: &TrackRef) -> Result<(), TransportError> {
        self.push_sender(MockSender::new(track.id(), track.kind()));
        Ok(())
    }

    fn remove_track(&self, track_id: &str) -> bool {
        let mut senders = self.senders.lock();
        let before = senders.len();
        senders.retain(|s| s.track_id().as_deref() != Some(track_id));
        senders.len() != before
    }

    fn senders(&self) -> Vec<Arc<dyn RtpSender>> {
        self.senders
            .lock()
            .iter()
            .map(|s| s.clone() as Arc<dyn RtpSender>)
            .collect()
    }

    fn receivers(&self) -> Vec<ReceiverInfo> {
        self.receivers.lock().clone()
    }

    fn ice_state(&self) -> IceConnectionState {
        *self.ice.lock()
    }

    fn label(&self) -> Option<String> {
        self.label.lock().clone()
    }

    async fn stats(&self) -> Result<StatsReport, TransportError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stats.lock().clone())
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A handle plus the sending half of its event channel
pub fn negotiation() -> (Negotiation, Arc<MockHandle>, mpsc::UnboundedSender<NegotiationEvent>) {
    let handle = MockHandle::new();
    let (tx, rx) = mpsc::unbounded_channel();
    (Negotiation::new(handle.clone(), rx), handle, tx)
}

// ---- renderer ----

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Attach(StreamId, Tile),
    Detach(StreamId),
    Label(StreamId, String, bool),
    Status(StreamId, bool),
    Active(StreamId, bool),
    Layout,
    Notify(NotifyLevel, String),
    Controls(Controls),
}

#[derive(Default)]
pub struct MockRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl MockRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    fn count(&self, f: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| f(c)).count()
    }

    pub fn attach_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCall::Attach(..)))
    }

    pub fn detach_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCall::Detach(..)))
    }

    pub fn notifications(&self, level: NotifyLevel) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Notify(l, message) if *l == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn active_changes(&self, id: &StreamId) -> Vec<bool> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Active(i, active) if i == id => Some(*active),
                _ => None,
            })
            .collect()
    }

    pub fn labels(&self, id: &StreamId) -> Vec<(String, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Label(i, text, fallback) if i == id => Some((text.clone(), *fallback)),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self, id: &StreamId) -> Vec<bool> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Status(i, healthy) if i == id => Some(*healthy),
                _ => None,
            })
            .collect()
    }

    pub fn last_controls(&self) -> Option<Controls> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            RenderCall::Controls(controls) => Some(*controls),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn push(&self, call: RenderCall) {
        self.calls.lock().push(call);
    }
}

impl Renderer for MockRenderer {
    fn attach(&self, id: &StreamId, tile: &Tile) {
        self.push(RenderCall::Attach(id.clone(), tile.clone()));
    }

    fn detach(&self, id: &StreamId) {
        self.push(RenderCall::Detach(id.clone()));
    }

    fn set_label(&self, id: &StreamId, text: &str, fallback: bool) {
        self.push(RenderCall::Label(id.clone(), text.to_string(), fallback));
    }

    fn set_status(&self, id: &StreamId, healthy: bool) {
        self.push(RenderCall::Status(id.clone(), healthy));
    }

    fn set_active(&self, id: &StreamId, active: bool) {
        self.push(RenderCall::Active(id.clone(), active));
    }

    fn recompute_layout(&self) {
        self.push(RenderCall::Layout);
    }

    fn notify(&self, level: NotifyLevel, message: &str) {
        self.push(RenderCall::Notify(level, message.to_string()));
    }

    fn set_controls(&self, controls: &Controls) {
        self.push(RenderCall::Controls(*controls));
    }
}

// ---- signaling client ----

#[derive(Default)]
pub struct MockClient {
    calls: Mutex<Vec<String>>,
    up: Mutex<HashMap<StreamId, (Arc<MockHandle>, mpsc::UnboundedSender<NegotiationEvent>)>>,
    fail_requests: AtomicBool,
    fail_up_streams: AtomicBool,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Latest handle registered for an upstream id
    pub fn handle(&self, id: &StreamId) -> Option<Arc<MockHandle>> {
        self.up.lock().get(id).map(|(h, _)| h.clone())
    }

    /// Deliver a negotiation event to an upstream record
    pub fn emit(&self, id: &StreamId, event: NegotiationEvent) -> bool {
        match self.up.lock().get(id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn fail_requests(&self) {
        self.fail_requests.store(true, Ordering::SeqCst);
    }

    /// Make every following upstream registration fail
    pub fn fail_up_streams(&self) {
        self.fail_up_streams.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) -> Result<(), TransportError> {
        self.calls.lock().push(call);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(TransportError::new("connection lost"));
        }
        Ok(())
    }
}

impl SessionClient for MockClient {
    fn login(&self, username: &str, _password: &str) -> Result<(), TransportError> {
        self.record(format!("login:{}", username))
    }

    fn join(&self, group: &str) -> Result<(), TransportError> {
        self.record(format!("join:{}", group))
    }

    fn request(&self, tier: &str) -> Result<(), TransportError> {
        self.record(format!("request:{}", tier))
    }

    fn chat(&self, username: &str, kind: &str, dest: &str, message: &str)
        -> Result<(), TransportError> {
        self.record(format!("chat:{}:{}:{}:{}", username, kind, dest, message))
    }

    fn group_action(&self, action: &str, arg: Option<&str>) -> Result<(), TransportError> {
        self.record(format!("group:{}:{}", action, arg.unwrap_or("")))
    }

    fn user_action(&self, action: &str, id: &str, arg: Option<&str>)
        -> Result<(), TransportError> {
        self.record(format!("user:{}:{}:{}", action, id, arg.unwrap_or("")))
    }

    fn new_up_stream(&self, id: &StreamId) -> Result<Negotiation, TransportError> {
        self.calls.lock().push(format!("up:{}", id));
        if self.fail_up_streams.load(Ordering::SeqCst) {
            return Err(TransportError::new("stream refused"));
        }
        let (negotiation, handle, tx) = negotiation();
        self.up.lock().insert(id.clone(), (handle, tx));
        Ok(negotiation)
    }

    fn close(&self) {
        self.calls.lock().push("close".to_string());
    }
}

// ---- capture ----

pub struct MockDevices {
    user_media_error: Mutex<Option<CaptureError>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    user_media_calls: AtomicUsize,
    last_constraints: Mutex<Option<MediaConstraints>>,
    display_supported: AtomicBool,
    display_events: Mutex<Vec<mpsc::UnboundedSender<TrackEvent>>>,
    file_events: Mutex<Vec<mpsc::UnboundedSender<TrackEvent>>>,
    tracks: Mutex<Vec<Arc<MockTrack>>>,
    devices: Mutex<Vec<DeviceInfo>>,
    enumerate_calls: AtomicUsize,
    counter: AtomicUsize,
}

impl Default for MockDevices {
    fn default() -> Self {
        Self {
            user_media_error: Mutex::new(None),
            gate: Mutex::new(None),
            user_media_calls: AtomicUsize::new(0),
            last_constraints: Mutex::new(None),
            display_supported: AtomicBool::new(true),
            display_events: Mutex::new(Vec::new()),
            file_events: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
            devices: Mutex::new(Vec::new()),
            enumerate_calls: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
        }
    }
}

impl MockDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next camera/mic captures fail
    pub fn fail_with(&self, error: CaptureError) {
        *self.user_media_error.lock() = Some(error);
    }

    pub fn succeed(&self) {
        *self.user_media_error.lock() = None;
    }

    /// Hold the next camera/mic capture until the returned sender fires
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    pub fn set_display_supported(&self, supported: bool) {
        self.display_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock() = devices;
    }

    pub fn user_media_count(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    pub fn enumerate_count(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        self.last_constraints.lock().clone()
    }

    /// Every track handed out so far
    pub fn tracks(&self) -> Vec<Arc<MockTrack>> {
        self.tracks.lock().clone()
    }

    pub fn display_events(&self) -> Option<mpsc::UnboundedSender<TrackEvent>> {
        self.display_events.lock().last().cloned()
    }

    pub fn file_events(&self) -> Option<mpsc::UnboundedSender<TrackEvent>> {
        self.file_events.lock().last().cloned()
    }

    fn make_track(&self, prefix: &str, kind: TrackKind) -> Arc<MockTrack> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let track = MockTrack::new(&format!("{}-{}", prefix, n), kind);
        self.tracks.lock().push(track.clone());
        track
    }
}

#[async_trait]
impl MediaDevices for MockDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints)
        -> Result<CapturedMedia, CaptureError> {
        self.user_media_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_constraints.lock() = Some(constraints.clone());

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(error) = self.user_media_error.lock().clone() {
            return Err(error);
        }

        let mut tracks: Vec<TrackRef> = Vec::new();
        if constraints.audio.is_some() {
            tracks.push(self.make_track("audio", TrackKind::Audio));
        }
        if constraints.video.is_some() {
            tracks.push(self.make_track("video", TrackKind::Video));
        }
        Ok(CapturedMedia::new(tracks))
    }

    async fn get_display_media(&self) -> Result<CapturedMedia, CaptureError> {
        if !self.display_supported.load(Ordering::SeqCst) {
            return Err(CaptureError::Unsupported("screen sharing".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.display_events.lock().push(tx);
        let track: TrackRef = self.make_track("screen", TrackKind::Video);
        Ok(CapturedMedia {
            tracks: vec![track],
            events: Some(rx),
            element: None,
        })
    }

    async fn capture_file(&self, file: &MediaFile) -> Result<CapturedMedia, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.file_events.lock().push(tx);
        Ok(CapturedMedia {
            tracks: Vec::new(),
            events: Some(rx),
            element: Some(MediaElement {
                id: file.name.clone(),
            }),
        })
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().clone())
    }

    fn supports_display_capture(&self) -> bool {
        self.display_supported.load(Ordering::SeqCst)
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// A file track created outside the capture mock
pub fn file_track(id: &str, kind: TrackKind) -> (Arc<MockTrack>, TrackEvent) {
    let track = MockTrack::new(id, kind);
    (track.clone(), TrackEvent::Added(track))
}

// ---- session ----

pub struct Fixture {
    pub session: Arc<Session>,
    pub client: Arc<MockClient>,
    pub renderer: Arc<MockRenderer>,
    pub devices: Arc<MockDevices>,
}

/// Session wired to fresh mocks, logged in to group "room" as "alice"
pub fn fixture(settings: Settings) -> Fixture {
    let client = MockClient::new();
    let renderer = MockRenderer::new();
    let devices = MockDevices::new();
    let session = Session::new(
        client.clone(),
        renderer.clone(),
        devices.clone(),
        SessionConfig::default(),
        settings,
    );
    session.set_credentials("alice", "secret");
    session.set_group("room");
    Fixture {
        session,
        client,
        renderer,
        devices,
    }
}

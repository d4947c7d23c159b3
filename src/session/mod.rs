//! Media session
//!
//! [`Session`] is the context object owning everything attached to one
//! signaling connection: the stream table, the user's settings, the roster
//! and the collaborators (signaling client, renderer, capture API).
//!
//! The table is guarded by a synchronous mutex that is never held across a
//! suspension point. Work that suspends (capture, sender parameters,
//! statistics) re-validates against the table after resuming.

pub mod coordinator;
pub mod roster;

use crate::capture::{MediaChoices, MediaDevices};
use crate::config::SessionConfig;
use crate::media::{
    rate_label, StatsPoller, StatsReport, StatsSink, StreamId, StreamKind, StreamRecord,
    StreamTable,
};
use crate::policy::{apply_bitrate, max_bitrate, ActivityDetector};
use crate::render::{Controls, Direction, NotifyLevel, Renderer};
use crate::settings::{Settings, SettingsStore};
use crate::signaling::{
    ClientEvent, DownstreamOffer, Negotiation, NegotiationEvent, NegotiationHandle, Permissions,
    SessionClient, UserChange,
};
use crate::utils::{SessionError, SessionResult};
use parking_lot::{Mutex, RwLock};
use roster::{Roster, RosterEntry};
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Notification shown once presenting is allowed
pub const PRESENT_HINT: &str = "Press Present to enable your camera or microphone";

/// Events emitted by the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected { code: u16, reason: String },
    /// A capture attempt failed; carries the user-facing message
    CaptureFailed(String),
    LocalMuteChanged(bool),
    ActivityChanged { id: StreamId, active: bool },
}

/// Login credentials for the group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct Session {
    client: Arc<dyn SessionClient>,
    renderer: Arc<dyn Renderer>,
    devices: Arc<dyn MediaDevices>,
    config: SessionConfig,
    settings: SettingsStore,
    table: Mutex<StreamTable>,
    detector: ActivityDetector,
    permissions: RwLock<Permissions>,
    credentials: RwLock<Option<Credentials>>,
    group: RwLock<String>,
    roster: Mutex<Roster>,
    /// Device list, filled after the first successful camera/mic capture
    choices: RwLock<Option<MediaChoices>>,
    event_tx: broadcast::Sender<SessionEvent>,
    weak: Weak<Session>,
}

impl Session {
    pub fn new(
        client: Arc<dyn SessionClient>,
        renderer: Arc<dyn Renderer>,
        devices: Arc<dyn MediaDevices>,
        config: SessionConfig,
        settings: Settings,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        let detector = ActivityDetector::from_config(&config);

        Arc::new_cyclic(|weak| Self {
            client,
            table: Mutex::new(StreamTable::new(renderer.clone())),
            renderer,
            devices,
            config,
            settings: SettingsStore::new(settings),
            detector,
            permissions: RwLock::new(Permissions::default()),
            credentials: RwLock::new(None),
            group: RwLock::new(String::new()),
            roster: Mutex::new(Roster::new()),
            choices: RwLock::new(None),
            event_tx,
            weak: weak.clone(),
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn set_credentials(&self, username: &str, password: &str) {
        *self.credentials.write() = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    pub fn clear_credentials(&self) {
        *self.credentials.write() = None;
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.read().is_some()
    }

    pub fn set_group(&self, group: &str) {
        *self.group.write() = group.to_string();
    }

    pub fn group(&self) -> String {
        self.group.read().clone()
    }

    pub fn permissions(&self) -> Permissions {
        *self.permissions.read()
    }

    /// Short permission description for the user line
    pub fn permission_text(&self) -> &'static str {
        self.permissions.read().describe()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.roster.lock().entries()
    }

    pub fn media_choices(&self) -> Option<MediaChoices> {
        self.choices.read().clone()
    }

    /// Read access to the stream table
    pub fn with_table<R>(&self, f: impl FnOnce(&StreamTable) -> R) -> R {
        f(&self.table.lock())
    }

    /// Id of the camera/microphone presentation, if any
    pub fn find_local_stream(&self) -> Option<StreamId> {
        self.table.lock().find_by_kind(StreamKind::Local)
    }

    pub fn find_stream(&self, kind: StreamKind) -> Option<StreamId> {
        self.table.lock().find_by_kind(kind)
    }

    fn spawn<F>(&self, future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(future)),
            Err(_) => {
                tracing::warn!("No runtime available, stream events will not be delivered");
                None
            }
        }
    }

    // ---- signaling events ----

    /// Dispatch a notification from the signaling layer
    pub fn handle_client_event(&self, event: ClientEvent) -> SessionResult<()> {
        match event {
            ClientEvent::Connected => self.on_connected(),
            ClientEvent::Closed { code, reason } => {
                self.on_closed(code, &reason);
                Ok(())
            }
            ClientEvent::Downstream(offer) => self.add_downstream(offer).map(|_| ()),
            ClientEvent::User { id, change, name } => self.on_user(&id, change, name.as_deref()),
            ClientEvent::Permissions(permissions) => {
                self.on_permissions(permissions);
                Ok(())
            }
        }
    }

    fn on_connected(&self) -> SessionResult<()> {
        let credentials = self
            .credentials
            .read()
            .clone()
            .ok_or(SessionError::NotConnected)?;

        self.roster.lock().reset();

        let group = self.group();
        tracing::info!("Connected, joining group {:?} as {}", group, credentials.username);

        self.client.login(&credentials.username, &credentials.password)?;
        self.client.join(&group)?;
        self.client.request(&self.settings.get().request)?;

        self.emit(SessionEvent::Connected);
        Ok(())
    }

    fn on_closed(&self, code: u16, reason: &str) {
        if code != self.config.normal_close_code {
            tracing::warn!("Socket close {} {}", code, reason);
        } else {
            tracing::info!("Connection closed");
        }

        {
            let mut table = self.table.lock();
            table.remove_by_kind(None);
            table.remove_all_down();
            self.push_controls(&table);
        }

        self.roster.lock().reset();
        self.renderer.notify(NotifyLevel::Error, "Disconnected!");
        self.emit(SessionEvent::Disconnected {
            code,
            reason: reason.to_string(),
        });
    }

    fn on_user(&self, id: &str, change: UserChange, name: Option<&str>) -> SessionResult<()> {
        match change {
            UserChange::Add => self.roster.lock().add(id, name)?,
            UserChange::Delete => self.roster.lock().remove(id, name)?,
            UserChange::Other(kind) => tracing::warn!("Unknown user change {:?}", kind),
        }
        Ok(())
    }

    fn on_permissions(&self, permissions: Permissions) {
        *self.permissions.write() = permissions;
        tracing::info!("Permissions: {}", permissions.describe());

        {
            let table = self.table.lock();
            self.push_controls(&table);
        }

        if permissions.present {
            self.renderer.notify(NotifyLevel::Info, PRESENT_HINT);
        }
    }

    /// Register a stream announced by the server
    pub fn add_downstream(&self, offer: DownstreamOffer) -> SessionResult<StreamId> {
        let DownstreamOffer { id, negotiation } = offer;
        let Negotiation { handle, events } = negotiation;

        let mut record = StreamRecord::new(id.clone(), StreamKind::Remote, handle.clone());
        if let Some(task) = self.spawn_negotiation_pump(Direction::Down, id.clone(), events) {
            record.attach_task(task);
        }
        if self.settings.get().activity_detection {
            record.set_stats_poller(self.down_stats_poller(&id, &handle));
        }

        let mut table = self.table.lock();
        table.insert(record)?;
        self.show_tile(&id, handle.as_ref());

        tracing::info!("Added downstream {}", id);
        Ok(id)
    }

    /// Caption and status for a freshly attached tile
    fn show_tile(&self, id: &StreamId, handle: &dyn NegotiationHandle) {
        self.renderer
            .set_label(id, &handle.label().unwrap_or_default(), false);
        self.renderer.set_status(id, handle.ice_state().is_healthy());
    }

    fn spawn_negotiation_pump(
        &self,
        direction: Direction,
        id: StreamId,
        mut events: mpsc::UnboundedReceiver<NegotiationEvent>,
    ) -> Option<JoinHandle<()>> {
        let weak = self.weak.clone();
        self.spawn(async move {
            while let Some(event) = events.recv().await {
                let session = match weak.upgrade() {
                    Some(session) => session,
                    None => break,
                };
                session.handle_negotiation_event(direction, &id, event).await;
            }
        })
    }

    fn handle_of(&self, direction: Direction, id: &StreamId) -> Option<Arc<dyn NegotiationHandle>> {
        self.table
            .lock()
            .get(direction, id)
            .map(|r| r.handle().clone())
    }

    /// React to an event raised by the negotiation handle of a record
    pub async fn handle_negotiation_event(
        &self,
        direction: Direction,
        id: &StreamId,
        event: NegotiationEvent,
    ) {
        match event {
            NegotiationEvent::StatusChanged => {
                if let Some(handle) = self.handle_of(direction, id) {
                    self.renderer.set_status(id, handle.ice_state().is_healthy());
                }
            }
            NegotiationEvent::LabelChanged(label) => {
                if self.table.lock().contains(direction, id) {
                    self.renderer.set_label(id, &label.unwrap_or_default(), false);
                }
            }
            NegotiationEvent::Error(message) => {
                tracing::error!("Stream {} failed: {}", id, message);
                self.renderer.notify(NotifyLevel::Error, &message);
                // a downstream record lives exactly as long as the server's stream
                if direction == Direction::Up {
                    self.destroy(Direction::Up, id);
                }
            }
            NegotiationEvent::Abort | NegotiationEvent::Closed => {
                tracing::info!("Stream {} closed by the server", id);
                self.destroy(direction, id);
            }
            NegotiationEvent::NegotiationCompleted => {
                if direction == Direction::Up {
                    self.on_negotiation_completed(id).await;
                }
            }
            NegotiationEvent::DownTrack { track_id, kind } => {
                let table = self.table.lock();
                if let Some(record) = table.down(id) {
                    tracing::debug!("Downstream {} got {:?} track {}", id, kind, track_id);
                    self.renderer.attach(id, &record.tile());
                    self.renderer.recompute_layout();
                    self.show_tile(id, record.handle().as_ref());
                }
            }
        }
    }

    async fn on_negotiation_completed(&self, id: &StreamId) {
        let handle = {
            let mut table = self.table.lock();
            match table.up_mut(id) {
                Some(record) => {
                    if !record.mark_bitrate_applied() {
                        return;
                    }
                    record.handle().clone()
                }
                None => return,
            }
        };

        let bitrate = max_bitrate(&self.settings.get().send);
        apply_bitrate(handle.as_ref(), bitrate).await;
    }

    // ---- exposed operations ----

    /// Destroy one record. Absent ids are a no-op.
    pub fn destroy(&self, direction: Direction, id: &StreamId) -> bool {
        let mut table = self.table.lock();
        let removed = table.remove(direction, id);
        if removed && direction == Direction::Up {
            self.push_controls(&table);
        }
        removed
    }

    /// Destroy upstream records of `kind`, or all of them
    pub fn destroy_upstream(&self, kind: Option<StreamKind>) -> usize {
        let mut table = self.table.lock();
        let removed = table.remove_by_kind(kind);
        self.push_controls(&table);
        removed
    }

    /// Store a new send quality and apply it to every upstream record
    pub async fn set_quality_tier(&self, tier: &str) {
        self.settings.update(|s| s.send = tier.to_string());
        let bitrate = max_bitrate(tier);
        tracing::info!("Send quality {} ({:?})", tier, bitrate);

        let handles = self.table.lock().handles(Direction::Up);
        for (id, handle) in handles {
            let present = self.table.lock().contains(Direction::Up, &id);
            if !present {
                continue;
            }
            apply_bitrate(handle.as_ref(), bitrate).await;
        }
    }

    /// Turn voice activity detection on or off for every downstream record
    pub fn set_activity_detection_enabled(&self, enabled: bool) {
        self.settings.update(|s| s.activity_detection = enabled);
        tracing::info!("Activity detection {}", if enabled { "enabled" } else { "disabled" });

        let mut table = self.table.lock();
        let ids = table.sorted_ids(Direction::Down);
        for id in ids {
            if enabled {
                let handle = match table.down(&id) {
                    Some(record) if record.stats_interval_ms() == 0 => record.handle().clone(),
                    _ => continue,
                };
                let poller = self.down_stats_poller(&id, &handle);
                if let Some(record) = table.down_mut(&id) {
                    record.set_stats_poller(poller);
                }
            } else {
                let record = match table.down_mut(&id) {
                    Some(record) => record,
                    None => continue,
                };
                record.set_stats_poller(None);
                if ActivityDetector::reset(&mut record.activity) {
                    self.renderer.set_active(&id, false);
                    self.emit(SessionEvent::ActivityChanged { id: id.clone(), active: false });
                }
            }
        }
    }

    fn down_stats_poller(
        &self,
        id: &StreamId,
        handle: &Arc<dyn NegotiationHandle>,
    ) -> Option<StatsPoller> {
        let weak = self.weak.clone();
        let id = id.clone();
        let sink: StatsSink = Arc::new(move |report| {
            if let Some(session) = weak.upgrade() {
                session.on_down_stats(&id, &report);
            }
        });
        StatsPoller::spawn(handle.clone(), self.detector.interval_ms(), sink)
    }

    fn up_stats_poller(
        &self,
        id: &StreamId,
        handle: &Arc<dyn NegotiationHandle>,
    ) -> Option<StatsPoller> {
        let weak = self.weak.clone();
        let id = id.clone();
        let sink: StatsSink = Arc::new(move |report| {
            if let Some(session) = weak.upgrade() {
                session.on_up_stats(&id, &report);
            }
        });
        StatsPoller::spawn(handle.clone(), self.config.up_stats_interval_ms, sink)
    }

    /// Feed a downstream statistics snapshot to the activity detector
    pub fn on_down_stats(&self, id: &StreamId, report: &StatsReport) {
        if !self.settings.get().activity_detection {
            return;
        }

        let change = {
            let mut table = self.table.lock();
            let record = match table.down_mut(id) {
                Some(record) => record,
                None => return,
            };
            // sampling may have been switched off while this sample was in flight
            if record.stats_interval_ms() == 0 {
                return;
            }
            let receivers = record.handle().receivers();
            let energy = ActivityDetector::max_energy(report, &receivers);
            self.detector.observe(&mut record.activity, energy, Instant::now())
        };

        if let Some(active) = change {
            tracing::debug!("Stream {} {}", id, if active { "active" } else { "inactive" });
            self.renderer.set_active(id, active);
            self.emit(SessionEvent::ActivityChanged { id: id.clone(), active });
        }
    }

    /// Show the outbound rate of an upstream record as its fallback label
    pub fn on_up_stats(&self, id: &StreamId, report: &StatsReport) {
        let handle = match self.handle_of(Direction::Up, id) {
            Some(handle) => handle,
            None => return,
        };

        match handle.label().filter(|l| !l.is_empty()) {
            Some(label) => self.renderer.set_label(id, &label, false),
            None => {
                let senders: Vec<String> =
                    handle.senders().iter().filter_map(|s| s.track_id()).collect();
                let text = rate_label(report, &senders);
                self.renderer.set_label(id, &text, !text.is_empty());
            }
        }
    }

    /// Store the mute setting and apply it to the local microphone
    pub fn set_local_mute(&self, mute: bool) {
        self.settings.update(|s| s.local_mute = mute);
        mute_local_tracks(&self.table.lock(), mute);
        tracing::info!("Local microphone {}", if mute { "muted" } else { "unmuted" });
        self.emit(SessionEvent::LocalMuteChanged(mute));
    }

    /// Re-capture the local presentation after a device or mode change
    pub async fn change_presentation(&self) -> SessionResult<Option<StreamId>> {
        match self.find_local_stream() {
            Some(id) => self.acquire_local_media(Some(id)).await,
            None => Ok(None),
        }
    }

    /// Store the receive tier and tell the server
    pub fn set_request_tier(&self, tier: &str) -> SessionResult<()> {
        self.settings.update(|s| s.request = tier.to_string());
        self.client.request(tier)?;
        Ok(())
    }

    pub fn chat(&self, kind: &str, dest: &str, message: &str) -> SessionResult<()> {
        let username = self
            .credentials
            .read()
            .as_ref()
            .map(|c| c.username.clone())
            .ok_or(SessionError::NotConnected)?;
        self.client.chat(&username, kind, dest, message)?;
        Ok(())
    }

    pub fn group_action(&self, action: &str, arg: Option<&str>) -> SessionResult<()> {
        self.client.group_action(action, arg)?;
        Ok(())
    }

    pub fn user_action(&self, action: &str, id: &str, arg: Option<&str>) -> SessionResult<()> {
        self.client.user_action(action, id, arg)?;
        Ok(())
    }

    /// Leave the group and release every stream
    pub fn close(&self) {
        {
            let mut table = self.table.lock();
            table.remove_by_kind(None);
            table.remove_all_down();
            self.push_controls(&table);
        }
        self.client.close();
    }

    // ---- controls ----

    pub fn controls(&self) -> Controls {
        let table = self.table.lock();
        self.compute_controls(&table)
    }

    fn compute_controls(&self, table: &StreamTable) -> Controls {
        let permissions = self.permissions();
        let local = table.find_by_kind(StreamKind::Local).is_some();

        Controls {
            present: permissions.present && !local,
            unpresent: local,
            share: permissions.present && self.devices.supports_display_capture(),
            unshare: table.find_by_kind(StreamKind::Screenshare).is_some(),
            stop_file: table.find_by_kind(StreamKind::File).is_some(),
            media_options: permissions.present,
        }
    }

    fn push_controls(&self, table: &StreamTable) {
        self.renderer.set_controls(&self.compute_controls(table));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("group", &*self.group.read())
            .field("table", &*self.table.lock())
            .finish_non_exhaustive()
    }
}

/// Enable or disable the audio tracks of the local presentation
fn mute_local_tracks(table: &StreamTable, mute: bool) {
    for record in table.records(Direction::Up) {
        if record.kind() != StreamKind::Local {
            continue;
        }
        for track in record.stream().audio_tracks() {
            track.set_enabled(!mute);
        }
    }
}

/// Group name from a page path: `/group/My%20Room` gives `My Room`
pub fn group_from_path(path: &str) -> String {
    let rest = match path.strip_prefix('/') {
        Some(tail) => match tail.find('/') {
            Some(end) if tail[..end].chars().all(|c| c.is_ascii_lowercase()) => &tail[end + 1..],
            _ => path,
        },
        None => path,
    };

    match urlencoding::decode(rest) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::warn!("Undecodable group path {:?}: {}", rest, e);
            rest.to_string()
        }
    }
}

/// Group name with its first character upper-cased
pub fn group_title(group: &str) -> String {
    let mut chars = group.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

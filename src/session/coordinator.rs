//! Capture coordinator
//!
//! Turns "present", "share screen" and "play file" into upstream records.
//!
//! Capture suspends, so everything observed before the platform call may
//! be stale afterwards. Each acquisition snapshots the teardown epoch of
//! its kind and re-checks it, together with the id it replaces, under the
//! same table lock that performs the insertion. When the table moved on
//! the freshly captured tracks are stopped instead of inserted.

use super::{mute_local_tracks, Session, SessionEvent};
use crate::capture::{MediaChoices, MediaConstraints, MediaFile, TrackEvent};
use crate::media::{
    ContentHint, StreamId, StreamKind, StreamRecord, StreamTable, TrackKind, TrackLabel, TrackRef,
};
use crate::render::{Direction, MediaElement, NotifyLevel};
use crate::signaling::Negotiation;
use crate::utils::{CaptureError, SessionError, SessionResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Warning raised when file audio forces the microphone off
pub const FORCED_MUTE_WARNING: &str = "You have been muted";

/// Message used when the platform cannot capture the screen
pub const NO_SCREEN_SHARING: &str = "Your browser does not support screen sharing";

fn stop_all(tracks: &[TrackRef]) {
    for track in tracks {
        track.stop();
    }
}

impl Session {
    /// Capture camera and/or microphone as the local presentation.
    ///
    /// With `existing` (or when a presentation already exists) the capture
    /// replaces that record in place, keeping its tile. Selecting neither
    /// camera nor microphone turns the presentation off. Returns the id of
    /// the presentation, or `None` when nothing was created.
    pub async fn acquire_local_media(
        &self,
        existing: Option<StreamId>,
    ) -> SessionResult<Option<StreamId>> {
        if !self.has_credentials() {
            tracing::debug!("Not logged in, ignoring presentation request");
            return Ok(None);
        }

        let settings = self.settings.get();
        let constraints = MediaConstraints::from_settings(&settings);

        let (target, epoch) = {
            let table = self.table.lock();
            let target = existing
                .filter(|id| table.contains(Direction::Up, id))
                .or_else(|| table.find_by_kind(StreamKind::Local));
            (target, table.epoch(StreamKind::Local))
        };

        if constraints.is_empty() {
            if let Some(id) = &target {
                tracing::info!("No devices selected, stopping presentation {}", id);
                self.destroy(Direction::Up, id);
            }
            return Ok(None);
        }

        // keep the tile while the new capture is pending
        if let Some(id) = &target {
            if let Some(record) = self.table.lock().up(id) {
                record.stop_tracks();
            }
        }

        tracing::info!("Acquiring local media: {:?}", constraints);
        let media = match self.devices.get_user_media(&constraints).await {
            Ok(media) => media,
            Err(e) => {
                if let Some(id) = &target {
                    self.destroy(Direction::Up, id);
                }
                return Err(self.report_capture_failure(e));
            }
        };

        let id = {
            let mut table = self.table.lock();

            let stale = table.epoch(StreamKind::Local) != epoch
                || match &target {
                    Some(id) => !table.contains(Direction::Up, id),
                    None => table.find_by_kind(StreamKind::Local).is_some(),
                };
            if stale {
                tracing::info!("Presentation changed during capture, discarding new tracks");
                stop_all(&media.tracks);
                return Ok(None);
            }

            let id = match &target {
                Some(id) => id.clone(),
                None => table.allocate_id(Direction::Up),
            };
            let negotiation = match self.client.new_up_stream(&id) {
                Ok(negotiation) => negotiation,
                Err(e) => {
                    stop_all(&media.tracks);
                    if target.is_some() {
                        table.remove(Direction::Up, &id);
                        self.push_controls(&table);
                    }
                    return Err(SessionError::NegotiationError {
                        id,
                        message: e.to_string(),
                    });
                }
            };

            let mut record = self.new_upstream_record(id.clone(), StreamKind::Local, negotiation, None);

            // read again: the user may have toggled mute during capture
            let mute = self.settings.get().local_mute;
            for track in media.tracks {
                match track.kind() {
                    TrackKind::Audio => {
                        if mute {
                            track.set_enabled(false);
                        }
                    }
                    TrackKind::Video => {
                        if settings.blackboard_mode {
                            track.set_content_hint(ContentHint::Detail);
                        }
                    }
                }
                Self::send_track(&mut record, track.clone(), TrackLabel::from(track.kind()));
            }
            if let Some(events) = media.events {
                if let Some(task) = self.spawn_track_pump(id.clone(), events) {
                    record.attach_task(task);
                }
            }

            let handle = record.handle().clone();
            if target.is_some() {
                table.replace(record);
            } else {
                table.insert(record)?;
            }
            self.show_tile(&id, handle.as_ref());
            self.push_controls(&table);
            id
        };

        tracing::info!("Presenting as {}", id);
        self.refresh_media_choices().await;
        Ok(Some(id))
    }

    /// Share a screen or window. Several shares may coexist.
    pub async fn acquire_screen_share(&self) -> SessionResult<Option<StreamId>> {
        if !self.has_credentials() {
            tracing::debug!("Not logged in, ignoring screen share request");
            return Ok(None);
        }

        if !self.devices.supports_display_capture() {
            return Err(self.report_capture_failure(CaptureError::Unsupported(
                NO_SCREEN_SHARING.to_string(),
            )));
        }

        let epoch = self.table.lock().epoch(StreamKind::Screenshare);
        let media = match self.devices.get_display_media().await {
            Ok(media) => media,
            Err(e) => return Err(self.report_capture_failure(e)),
        };

        let mut table = self.table.lock();
        if table.epoch(StreamKind::Screenshare) != epoch {
            tracing::info!("Screen shares stopped during capture, discarding new tracks");
            stop_all(&media.tracks);
            return Ok(None);
        }

        let id = table.allocate_id(Direction::Up);
        let negotiation = match self.client.new_up_stream(&id) {
            Ok(negotiation) => negotiation,
            Err(e) => {
                stop_all(&media.tracks);
                return Err(SessionError::NegotiationError {
                    id,
                    message: e.to_string(),
                });
            }
        };

        let mut record =
            self.new_upstream_record(id.clone(), StreamKind::Screenshare, negotiation, media.element);
        for track in media.tracks {
            Self::send_track(&mut record, track, TrackLabel::Screenshare);
        }
        if let Some(events) = media.events {
            if let Some(task) = self.spawn_track_pump(id.clone(), events) {
                record.attach_task(task);
            }
        }

        let handle = record.handle().clone();
        table.insert(record)?;
        self.show_tile(&id, handle.as_ref());
        self.push_controls(&table);

        tracing::info!("Sharing screen as {}", id);
        Ok(Some(id))
    }

    /// Play a local file into the conference. Tracks arrive and leave as
    /// the file plays; the record goes away with its last track.
    pub async fn acquire_file_media(&self, file: &MediaFile) -> SessionResult<Option<StreamId>> {
        if !self.has_credentials() {
            tracing::debug!("Not logged in, ignoring file {}", file.name);
            return Ok(None);
        }

        let epoch = self.table.lock().epoch(StreamKind::File);
        let media = match self.devices.capture_file(file).await {
            Ok(media) => media,
            Err(e) => return Err(self.report_capture_failure(e)),
        };

        let mut muted = false;
        let id = {
            let mut table = self.table.lock();
            if table.epoch(StreamKind::File) != epoch {
                tracing::info!("Files stopped during capture, discarding {}", file.name);
                stop_all(&media.tracks);
                return Ok(None);
            }

            let id = table.allocate_id(Direction::Up);
            let negotiation = match self.client.new_up_stream(&id) {
                Ok(negotiation) => negotiation,
                Err(e) => {
                    stop_all(&media.tracks);
                    return Err(SessionError::NegotiationError {
                        id,
                        message: e.to_string(),
                    });
                }
            };

            let element = media.element.unwrap_or_else(|| MediaElement {
                id: file.name.clone(),
            });
            let mut record =
                self.new_upstream_record(id.clone(), StreamKind::File, negotiation, Some(element));
            for track in media.tracks {
                muted |= self.guard_file_audio(&table, &track);
                Self::send_track(&mut record, track.clone(), TrackLabel::from(track.kind()));
            }
            if let Some(events) = media.events {
                if let Some(task) = self.spawn_track_pump(id.clone(), events) {
                    record.attach_task(task);
                }
            }

            let handle = record.handle().clone();
            table.insert(record)?;
            self.show_tile(&id, handle.as_ref());
            self.push_controls(&table);
            id
        };

        if muted {
            self.announce_forced_mute();
        }

        tracing::info!("Playing {} as {}", file.name, id);
        Ok(Some(id))
    }

    /// Record for a new upstream stream, with its negotiation events and
    /// rate label sampling wired up
    fn new_upstream_record(
        &self,
        id: StreamId,
        kind: StreamKind,
        negotiation: Negotiation,
        element: Option<MediaElement>,
    ) -> StreamRecord {
        let Negotiation { handle, events } = negotiation;

        let mut record = StreamRecord::new(id.clone(), kind, handle.clone());
        if let Some(element) = element {
            record = record.with_element(element);
        }
        if let Some(task) = self.spawn_negotiation_pump(Direction::Up, id.clone(), events) {
            record.attach_task(task);
        }
        record.set_stats_poller(self.up_stats_poller(&id, &handle));
        record
    }

    /// Label a track and hand it to the record's negotiation handle
    fn send_track(record: &mut StreamRecord, track: TrackRef, label: TrackLabel) {
        if let Err(e) = record.handle().add_track(&track) {
            tracing::error!("Failed to send track {} of {}: {}", track.id(), record.id(), e);
        }
        record.add_track(track, label);
    }

    fn spawn_track_pump(
        &self,
        id: StreamId,
        mut events: mpsc::UnboundedReceiver<TrackEvent>,
    ) -> Option<JoinHandle<()>> {
        let weak = self.weak.clone();
        self.spawn(async move {
            while let Some(event) = events.recv().await {
                let session = match weak.upgrade() {
                    Some(session) => session,
                    None => break,
                };
                session.handle_track_event(&id, event);
            }
        })
    }

    /// Apply a track change reported by the capture source of a record
    pub fn handle_track_event(&self, id: &StreamId, event: TrackEvent) {
        match event {
            TrackEvent::Added(track) => self.add_upstream_track(id, track),
            TrackEvent::Removed(track_id) => self.remove_upstream_track(id, &track_id),
            TrackEvent::Ended(track_id) => {
                let kind = self.table.lock().up(id).map(|r| r.kind());
                match kind {
                    Some(StreamKind::Screenshare) => {
                        tracing::info!("Screen share {} ended by the user", id);
                        self.destroy(Direction::Up, id);
                    }
                    Some(_) => self.remove_upstream_track(id, &track_id),
                    None => {}
                }
            }
        }
    }

    fn add_upstream_track(&self, id: &StreamId, track: TrackRef) {
        let muted = {
            let mut table = self.table.lock();
            let kind = match table.up(id) {
                Some(record) => record.kind(),
                None => {
                    tracing::debug!("Track {} arrived for gone stream {}", track.id(), id);
                    track.stop();
                    return;
                }
            };

            let muted = kind == StreamKind::File && self.guard_file_audio(&table, &track);
            let label = match kind {
                StreamKind::Screenshare => TrackLabel::Screenshare,
                _ => TrackLabel::from(track.kind()),
            };
            if let Some(record) = table.up_mut(id) {
                Self::send_track(record, track, label);
            }
            muted
        };

        if muted {
            self.announce_forced_mute();
        }
    }

    fn remove_upstream_track(&self, id: &StreamId, track_id: &str) {
        let mut table = self.table.lock();
        let remaining = match table.up_mut(id) {
            Some(record) => {
                if !record.handle().remove_track(track_id) {
                    tracing::warn!("Removing unknown track {} from {}", track_id, id);
                }
                record.remove_track(track_id)
            }
            None => return,
        };

        if remaining == 0 {
            tracing::info!("Last track of {} removed", id);
            table.remove(Direction::Up, id);
            self.push_controls(&table);
        }
    }

    /// File audio must not be sent alongside an unmuted presentation.
    /// Mutes the microphone when that would happen; returns whether it did.
    fn guard_file_audio(&self, table: &StreamTable, track: &TrackRef) -> bool {
        if track.kind() != TrackKind::Audio {
            return false;
        }
        let presenting = table.find_by_kind(StreamKind::Local).is_some();
        if !presenting || self.settings.get().local_mute {
            return false;
        }

        self.settings.update(|s| s.local_mute = true);
        mute_local_tracks(table, true);
        tracing::warn!("File audio started while presenting, muting microphone");
        true
    }

    fn announce_forced_mute(&self) {
        self.renderer.notify(NotifyLevel::Warning, FORCED_MUTE_WARNING);
        self.emit(SessionEvent::LocalMuteChanged(true));
    }

    /// Surface a capture failure to the user and turn it into the error
    /// returned to the caller
    fn report_capture_failure(&self, error: CaptureError) -> SessionError {
        tracing::error!("Capture failed: {}", error);
        let message = error.to_string();
        self.renderer.notify(NotifyLevel::Error, &message);
        self.emit(SessionEvent::CaptureFailed(message));
        SessionError::CaptureFailed(error)
    }

    /// Device labels become readable once capture permission is granted,
    /// so the list is fetched after the first successful capture
    async fn refresh_media_choices(&self) {
        if self.choices.read().is_some() {
            return;
        }
        match self.devices.enumerate_devices().await {
            Ok(devices) => {
                let choices = MediaChoices::from_devices(&devices);
                tracing::debug!(
                    "{} camera(s), {} microphone(s)",
                    choices.cameras.len(),
                    choices.microphones.len()
                );
                *self.choices.write() = Some(choices);
            }
            Err(e) => tracing::error!("Failed to enumerate devices: {}", e),
        }
    }
}

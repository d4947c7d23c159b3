//! Media button handlers
//!
//! Thin wrappers over the session that the UI binds its buttons to.

use crate::capture::MediaFile;
use crate::media::{StreamId, StreamKind};
use crate::session::Session;
use crate::utils::ErrorResponse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State behind the media buttons
pub struct MediaCommands {
    session: Arc<Session>,
    /// Whether a presentation capture is currently running
    is_presenting: Arc<AtomicBool>,
}

impl MediaCommands {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            is_presenting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether a presentation capture is currently running
    pub fn is_presenting(&self) -> bool {
        self.is_presenting.load(Ordering::Relaxed)
    }

    /// Start (or restart) the camera/microphone presentation
    pub async fn present(&self) -> Result<Option<StreamId>, ErrorResponse> {
        if self
            .is_presenting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ErrorResponse::new(
                "ALREADY_IN_PROGRESS",
                "Media acquisition is already in progress",
            ));
        }

        tracing::info!("Present requested");
        let result = self.session.acquire_local_media(None).await;
        self.is_presenting.store(false, Ordering::Release);

        result.map_err(ErrorResponse::from)
    }

    pub fn unpresent(&self) -> usize {
        tracing::info!("Unpresent requested");
        self.session.destroy_upstream(Some(StreamKind::Local))
    }

    pub async fn share(&self) -> Result<Option<StreamId>, ErrorResponse> {
        tracing::info!("Screen share requested");
        Ok(self.session.acquire_screen_share().await?)
    }

    pub fn unshare(&self) -> usize {
        tracing::info!("Stopping all screen shares");
        self.session.destroy_upstream(Some(StreamKind::Screenshare))
    }

    pub fn stop_files(&self) -> usize {
        tracing::info!("Stopping file playback");
        self.session.destroy_upstream(Some(StreamKind::File))
    }

    /// Play each file as its own upstream stream
    pub async fn play_files(&self, files: Vec<MediaFile>) -> Result<Vec<StreamId>, ErrorResponse> {
        let mut ids = Vec::with_capacity(files.len());
        for file in &files {
            if let Some(id) = self.session.acquire_file_media(file).await? {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

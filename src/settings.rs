//! User settings
//!
//! Settings are plain serialisable values; how the UI persists them is its
//! own business. The store hands out copies and applies updates atomically.

use crate::config::SessionConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// User-controlled settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Microphone muted on local presentations
    pub local_mute: bool,

    /// Camera device id, `None` for no video
    pub video: Option<String>,

    /// Microphone device id, `None` for no audio
    pub audio: Option<String>,

    /// Send quality tier name
    pub send: String,

    /// Receive request tier name
    pub request: String,

    pub activity_detection: bool,

    /// High resolution, detail-optimised camera capture
    pub blackboard_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            local_mute: false,
            video: None,
            audio: None,
            send: config.default_send,
            request: config.default_request,
            activity_detection: false,
            blackboard_mode: false,
        }
    }
}

/// Shared settings holder
#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Snapshot of the current settings
    pub fn get(&self) -> Settings {
        self.inner.read().clone()
    }

    /// Apply a change and return the new settings
    pub fn update<F>(&self, f: F) -> Settings
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.inner.write();
        f(&mut guard);
        guard.clone()
    }
}

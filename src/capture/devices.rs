//! Device choices offered to the user

use super::traits::{DeviceInfo, DeviceKind};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChoice {
    pub device_id: String,
    pub label: String,
}

/// Cameras and microphones, in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaChoices {
    pub cameras: Vec<MediaChoice>,
    pub microphones: Vec<MediaChoice>,
}

impl MediaChoices {
    /// Build choices from an enumeration. Unlabeled devices are named
    /// "Camera N" / "Microphone N"; a repeated device id updates the label
    /// of the earlier entry.
    pub fn from_devices(devices: &[DeviceInfo]) -> Self {
        let mut choices = Self::default();
        let (mut cn, mut mn) = (1, 1);

        for device in devices {
            match device.kind {
                DeviceKind::VideoInput => {
                    let label = if device.label.is_empty() {
                        format!("Camera {}", cn)
                    } else {
                        device.label.clone()
                    };
                    upsert(&mut choices.cameras, &device.device_id, label);
                    cn += 1;
                }
                DeviceKind::AudioInput => {
                    let label = if device.label.is_empty() {
                        format!("Microphone {}", mn)
                    } else {
                        device.label.clone()
                    };
                    upsert(&mut choices.microphones, &device.device_id, label);
                    mn += 1;
                }
                DeviceKind::AudioOutput => {}
            }
        }

        choices
    }

    pub fn has_camera(&self, id: &str) -> bool {
        self.cameras.iter().any(|c| c.device_id == id)
    }

    pub fn has_microphone(&self, id: &str) -> bool {
        self.microphones.iter().any(|c| c.device_id == id)
    }

    /// Point unset or vanished device selections at the first available
    /// device. Returns whether `settings` changed.
    pub fn reconcile(&self, settings: &mut Settings) -> bool {
        let mut changed = false;

        let video_ok = settings.video.as_deref().map_or(false, |id| self.has_camera(id));
        if !video_ok {
            let default = self.cameras.first().map(|c| c.device_id.clone());
            if settings.video != default {
                settings.video = default;
                changed = true;
            }
        }

        let audio_ok = settings.audio.as_deref().map_or(false, |id| self.has_microphone(id));
        if !audio_ok {
            let default = self.microphones.first().map(|c| c.device_id.clone());
            if settings.audio != default {
                settings.audio = default;
                changed = true;
            }
        }

        changed
    }
}

fn upsert(list: &mut Vec<MediaChoice>, device_id: &str, label: String) {
    match list.iter_mut().find(|c| c.device_id == device_id) {
        Some(existing) => existing.label = label,
        None => list.push(MediaChoice {
            device_id: device_id.to_string(),
            label,
        }),
    }
}

//! Platform capture
//!
//! Camera, microphone, screen and file capture as consumed by the session.

pub mod devices;
pub mod traits;

// Re-export traits
pub use devices::{MediaChoice, MediaChoices};
pub use traits::{
    AudioConstraints, CapturedMedia, DeviceInfo, DeviceKind, MediaConstraints, MediaDevices,
    MediaFile, SizeRange, TrackEvent, VideoConstraints, BLACKBOARD_HEIGHT, BLACKBOARD_WIDTH,
};

//! Bandwidth and activity policies

pub mod activity;
pub mod bitrate;

pub use activity::ActivityDetector;
pub use bitrate::{apply_bitrate, max_bitrate, MaxBitrate, QualityTier};

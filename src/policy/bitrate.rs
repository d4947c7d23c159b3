//! Send bitrate policy
//!
//! Maps the user's quality tier to a maximum video send bitrate and pushes
//! that cap down to the video senders of a negotiation handle.

use crate::media::TrackKind;
use crate::signaling::{EncodingParameters, NegotiationHandle};
use serde::{Deserialize, Serialize};

/// User-selectable send quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Lowest,
    Low,
    Normal,
    Unlimited,
}

impl QualityTier {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lowest" => Some(QualityTier::Lowest),
            "low" => Some(QualityTier::Low),
            "normal" => Some(QualityTier::Normal),
            "unlimited" => Some(QualityTier::Unlimited),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Lowest => "lowest",
            QualityTier::Low => "low",
            QualityTier::Normal => "normal",
            QualityTier::Unlimited => "unlimited",
        }
    }

    pub fn max_bitrate(self) -> MaxBitrate {
        match self {
            QualityTier::Lowest => MaxBitrate::Capped(150_000),
            QualityTier::Low => MaxBitrate::Capped(300_000),
            QualityTier::Normal => MaxBitrate::Capped(700_000),
            QualityTier::Unlimited => MaxBitrate::Unlimited,
        }
    }
}

/// Maximum send bitrate in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxBitrate {
    Capped(u32),
    Unlimited,
}

impl MaxBitrate {
    /// Encoding parameter value; `None` clears the cap
    pub fn bps(self) -> Option<u32> {
        match self {
            MaxBitrate::Capped(bps) => Some(bps),
            MaxBitrate::Unlimited => None,
        }
    }
}

/// Bitrate for a tier name. Unknown names are logged and treated as
/// `normal`, since the value comes from user settings.
pub fn max_bitrate(tier: &str) -> MaxBitrate {
    match QualityTier::parse(tier) {
        Some(tier) => tier.max_bitrate(),
        None => {
            tracing::error!("Unknown video quality {:?}, using normal", tier);
            QualityTier::Normal.max_bitrate()
        }
    }
}

/// Set (or clear) the maximum bitrate on every video sender of `handle`.
///
/// A sender that rejects its parameters is logged and skipped; the others
/// are still updated. Returns the number of senders updated.
pub async fn apply_bitrate(handle: &dyn NegotiationHandle, bitrate: MaxBitrate) -> usize {
    let mut applied = 0;

    for sender in handle.senders() {
        if sender.track_id().is_none() || sender.track_kind() != Some(TrackKind::Video) {
            continue;
        }

        let mut params = sender.parameters();
        if params.encodings.is_empty() {
            params.encodings.push(EncodingParameters::default());
        }
        for encoding in &mut params.encodings {
            encoding.max_bitrate = bitrate.bps();
        }

        match sender.set_parameters(params).await {
            Ok(()) => applied += 1,
            Err(e) => tracing::error!("Failed to set sender parameters: {}", e),
        }
    }

    tracing::debug!("Applied {:?} to {} video sender(s)", bitrate, applied);
    applied
}

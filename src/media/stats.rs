//! Periodic statistics sampling
//!
//! Each record that wants statistics owns a [`StatsPoller`]: a background
//! task that asks the negotiation handle for a snapshot every period and
//! hands it to a sink. Dropping the poller stops the task, so a destroyed
//! record can never receive another sample.

use crate::signaling::NegotiationHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-track statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    /// Outbound rate in bits per second (senders only)
    pub outbound_rate: Option<f64>,

    /// Audio energy sample (receivers only). Already a squared quantity.
    pub audio_energy: Option<f64>,
}

/// One statistics snapshot, keyed by track id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub tracks: HashMap<String, TrackStats>,
}

impl StatsReport {
    pub fn track(&self, id: &str) -> Option<&TrackStats> {
        self.tracks.get(id)
    }

    /// Audio energy for a track, with missing or non-finite values read as zero
    pub fn audio_energy(&self, id: &str) -> f64 {
        self.tracks
            .get(id)
            .and_then(|s| s.audio_energy)
            .filter(|e| e.is_finite())
            .unwrap_or(0.0)
    }

    pub fn with_energy(mut self, id: &str, energy: f64) -> Self {
        self.tracks.entry(id.to_string()).or_default().audio_energy = Some(energy);
        self
    }

    pub fn with_rate(mut self, id: &str, rate: f64) -> Self {
        self.tracks.entry(id.to_string()).or_default().outbound_rate = Some(rate);
        self
    }
}

/// Receives snapshots produced by a poller
pub type StatsSink = Arc<dyn Fn(StatsReport) + Send + Sync>;

/// Background statistics task bound to one negotiation handle
pub struct StatsPoller {
    interval_ms: u64,
    task: JoinHandle<()>,
}

impl StatsPoller {
    /// Start sampling. Returns `None` when the interval is zero or when
    /// called outside a tokio runtime.
    pub fn spawn(
        handle: Arc<dyn NegotiationHandle>,
        interval_ms: u64,
        sink: StatsSink,
    ) -> Option<Self> {
        if interval_ms == 0 {
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No runtime available, statistics sampling disabled");
                return None;
            }
        };

        let period = Duration::from_millis(interval_ms);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match handle.stats().await {
                    Ok(report) => sink(report),
                    Err(e) => tracing::debug!("Statistics unavailable: {}", e),
                }
            }
        });

        Some(Self { interval_ms, task })
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for StatsPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsPoller")
            .field("interval_ms", &self.interval_ms)
            .finish()
    }
}

/// Upstream label text built from per-sender outbound rates,
/// e.g. `"512kbps + 64kbps"`. Empty when no sender reports a rate.
pub fn rate_label(report: &StatsReport, sender_track_ids: &[String]) -> String {
    sender_track_ids
        .iter()
        .filter_map(|id| report.track(id).and_then(|s| s.outbound_rate))
        .filter(|rate| rate.is_finite())
        .map(|rate| format!("{}kbps", (rate / 1000.0).round() as i64))
        .collect::<Vec<_>>()
        .join(" + ")
}

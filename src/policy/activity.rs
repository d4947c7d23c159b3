//! Voice activity detection
//!
//! Turns periodic audio energy samples of a downstream stream into an
//! active/inactive signal. A stream becomes active on the first loud sample
//! and only drops back once no loud sample has been seen for a full
//! hysteresis period, so short pauses in speech do not flicker.

use crate::config::SessionConfig;
use crate::media::{ActivityState, StatsReport};
use crate::signaling::ReceiverInfo;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityDetector {
    /// Squared volume threshold; energy samples are already squared
    energy_threshold: f64,
    period: Duration,
    interval_ms: u64,
}

impl ActivityDetector {
    pub fn new(volume_threshold: f64, period: Duration, interval_ms: u64) -> Self {
        Self {
            energy_threshold: volume_threshold * volume_threshold,
            period,
            interval_ms,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.activity_threshold,
            config.activity_period(),
            config.activity_interval_ms,
        )
    }

    pub fn energy_threshold(&self) -> f64 {
        self.energy_threshold
    }

    /// Sampling period while detection is enabled
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Loudest energy over the receiving tracks. Missing or NaN samples
    /// count as silence.
    pub fn max_energy(report: &StatsReport, receivers: &[ReceiverInfo]) -> f64 {
        receivers
            .iter()
            .map(|r| report.audio_energy(&r.track_id))
            .fold(0.0, f64::max)
    }

    /// Feed one sample. Returns the new state when it changed.
    pub fn observe(&self, state: &mut ActivityState, max_energy: f64, now: Instant) -> Option<bool> {
        if max_energy > self.energy_threshold {
            state.last_voice_activity = Some(now);
            if !state.active {
                state.active = true;
                return Some(true);
            }
            return None;
        }

        if !state.active {
            return None;
        }

        let expired = match state.last_voice_activity {
            Some(last) => now.saturating_duration_since(last) > self.period,
            None => true,
        };
        if expired {
            state.active = false;
            return Some(false);
        }
        None
    }

    /// Force a state back to inactive. Returns whether it was active.
    pub fn reset(state: &mut ActivityState) -> bool {
        let was_active = state.active;
        *state = ActivityState::default();
        was_active
    }
}

impl Default for ActivityDetector {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

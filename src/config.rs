//! Session configuration
//!
//! Tunables of the session controller. Every field has a default so a
//! configuration file only needs to name what it changes.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Downstream statistics period while activity detection is on
    pub activity_interval_ms: u64,

    /// How long a stream stays active after the last loud sample
    pub activity_period_ms: u64,

    /// Volume threshold; compared squared against audio energy
    pub activity_threshold: f64,

    /// Upstream statistics period (rate labels)
    pub up_stats_interval_ms: u64,

    /// Quality tier used when the user has not chosen one
    pub default_send: String,

    /// Request tier used when the user has not chosen one
    pub default_request: String,

    /// Close code of an orderly disconnect
    pub normal_close_code: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activity_interval_ms: 200,
            activity_period_ms: 700,
            activity_threshold: 0.2,
            up_stats_interval_ms: 2000,
            default_send: "normal".to_string(),
            default_request: "everything".to_string(),
            normal_close_code: 1000,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: SessionConfig =
            serde_json::from_str(json).context("Invalid session configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {:?}", path))?;
        let config = Self::from_json(&content)?;

        tracing::debug!("Loaded session configuration from {:?}", path);

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.activity_threshold.is_finite() || self.activity_threshold < 0.0 {
            anyhow::bail!("activityThreshold must be a non-negative number");
        }
        Ok(())
    }

    pub fn activity_period(&self) -> Duration {
        Duration::from_millis(self.activity_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.activity_interval_ms, 200);
        assert_eq!(config.activity_period_ms, 700);
        assert_eq!(config.activity_threshold, 0.2);
        assert_eq!(config.up_stats_interval_ms, 2000);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"activityPeriodMs": 1000}"#).unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.activity_period_ms, 1000);
        assert_eq!(config.activity_interval_ms, 200);
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = SessionConfig::from_json(r#"{"activityThreshold": -1.0}"#).unwrap_err();
        assert!(err.to_string().contains("activityThreshold"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(SessionConfig::load(&dir.path().join("absent.json")).is_err());
    }
}

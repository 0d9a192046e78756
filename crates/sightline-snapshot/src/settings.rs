//! Snapshot buffering and timeline configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default maximum number of buffered snapshots per entity
pub const DEFAULT_BUFFER_LIMIT: usize = 32;

/// Tuning for snapshot buffers and remote timelines
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
///
/// # Example
///
/// ```
/// use sightline_snapshot::SnapshotSettings;
///
/// let settings: SnapshotSettings = ron::from_str("(buffer_limit: 64)").unwrap();
/// assert_eq!(settings.buffer_limit, 64);
/// assert_eq!(settings.buffer_time_multiplier, 2.0);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Inserts beyond this many buffered snapshots are rejected
    pub buffer_limit: usize,

    /// Playback delay in multiples of the send interval
    pub buffer_time_multiplier: f64,

    /// Timescale bonus while the timeline lags too far behind
    pub catchup_speed: f64,

    /// Timescale penalty while the timeline runs too far ahead
    pub slowdown_speed: f64,

    /// Drift below `send_interval * this` slows playback down
    pub catchup_negative_threshold: f64,

    /// Drift above `send_interval * this` speeds playback up
    pub catchup_positive_threshold: f64,

    /// Seconds of history averaged into the drift estimate
    pub drift_ema_duration: f64,

    /// Seconds of history averaged into the delivery jitter estimate
    pub delivery_time_ema_duration: f64,

    /// Recompute `buffer_time_multiplier` from measured jitter
    pub dynamic_adjustment: bool,

    /// Extra send intervals added on top of the jitter-derived multiplier
    pub dynamic_adjustment_tolerance: f64,

    /// Scales the staleness gap that triggers a history rewrite
    pub correction_multiplier: f64,

    /// Largest interpolation factor handed out past the newest snapshot
    ///
    /// `None` extrapolates without bound.
    pub extrapolation_limit: Option<f64>,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            buffer_time_multiplier: 2.0,
            catchup_speed: 0.02,
            slowdown_speed: 0.04,
            catchup_negative_threshold: -1.0,
            catchup_positive_threshold: 1.0,
            drift_ema_duration: 1.0,
            delivery_time_ema_duration: 2.0,
            dynamic_adjustment: true,
            dynamic_adjustment_tolerance: 1.0,
            correction_multiplier: 1.0,
            extrapolation_limit: None,
        }
    }
}

impl SnapshotSettings {
    /// Playback delay in seconds for a given send interval
    pub fn buffer_time(&self, send_interval: f64) -> f64 {
        send_interval * self.buffer_time_multiplier
    }

    /// Gap between an incoming snapshot and the newest buffered one beyond
    /// which the buffer is considered stale
    pub fn correction_threshold(&self, send_interval: f64) -> f64 {
        self.buffer_time(send_interval) * self.correction_multiplier
    }

    /// Check every field is usable
    pub fn validate(&self) -> Result<()> {
        if self.buffer_limit == 0 {
            return Err(Error::InvalidSettings(
                "buffer_limit must be at least 1".to_string(),
            ));
        }

        let non_negative = [
            ("buffer_time_multiplier", self.buffer_time_multiplier),
            ("catchup_speed", self.catchup_speed),
            ("slowdown_speed", self.slowdown_speed),
            ("dynamic_adjustment_tolerance", self.dynamic_adjustment_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidSettings(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }

        let positive = [
            ("drift_ema_duration", self.drift_ema_duration),
            ("delivery_time_ema_duration", self.delivery_time_ema_duration),
            ("correction_multiplier", self.correction_multiplier),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidSettings(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }

        if self.slowdown_speed >= 1.0 {
            return Err(Error::InvalidSettings(format!(
                "slowdown_speed must be < 1, got {}",
                self.slowdown_speed
            )));
        }
        if self.catchup_negative_threshold > self.catchup_positive_threshold {
            return Err(Error::InvalidSettings(
                "catchup_negative_threshold must not exceed catchup_positive_threshold".to_string(),
            ));
        }
        if let Some(limit) = self.extrapolation_limit {
            if !limit.is_finite() || limit < 1.0 {
                return Err(Error::InvalidSettings(format!(
                    "extrapolation_limit must be finite and >= 1, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }
}

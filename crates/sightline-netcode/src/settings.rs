//! Replication settings
//!
//! Loaded from RON like every other sightline config:
//!
//! ```ron
//! (
//!     send_interval: 0.05,
//!     sync_scale: true,
//!     position_precision: 0.001,
//!     snapshot: (buffer_limit: 64),
//! )
//! ```

use crate::transport::Channel;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sightline_codec::Precision;
use sightline_snapshot::SnapshotSettings;
use std::path::Path;

/// How and how often transforms are replicated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    /// Seconds between sends per entity
    pub send_interval: f64,

    /// Channel sync messages go out on; teleports are always reliable
    pub channel: Channel,

    /// Delta-code positions and scales against the last sent values
    ///
    /// Requires the reliable channel: a dropped delta would desynchronize
    /// the receiver's baseline for good.
    pub delta_compression: bool,

    /// Skip sends while nothing changed, after one confirming send
    pub only_sync_on_change: bool,

    /// Seconds between forced full messages, 0 to disable
    pub full_resync_interval: f64,

    pub sync_position: bool,
    pub sync_rotation: bool,
    pub sync_scale: bool,

    /// Render the interpolated value, or snap to the newest endpoint
    pub interpolate_position: bool,
    pub interpolate_rotation: bool,
    pub interpolate_scale: bool,

    /// Send rotations as 32-bit smallest-three instead of raw floats
    pub compress_rotation: bool,

    /// Degrees a rotation must turn before it counts as changed
    pub rotation_sensitivity: f32,

    pub position_precision: Precision,
    pub scale_precision: Precision,

    /// Receive-side buffering and timeline tuning
    pub snapshot: SnapshotSettings,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            send_interval: 1.0 / 30.0,
            channel: Channel::Reliable,
            delta_compression: true,
            only_sync_on_change: true,
            full_resync_interval: 0.0,
            sync_position: true,
            sync_rotation: true,
            sync_scale: false,
            interpolate_position: true,
            interpolate_rotation: true,
            interpolate_scale: true,
            compress_rotation: true,
            rotation_sensitivity: 0.01,
            position_precision: Precision::CENTIMETER,
            scale_precision: Precision::CENTIMETER,
            snapshot: SnapshotSettings::default(),
        }
    }
}

impl ReplicationSettings {
    /// Parse settings from RON text
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let settings: ReplicationSettings = ron::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a RON file
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Check every field is usable
    pub fn validate(&self) -> Result<()> {
        if !self.send_interval.is_finite() || self.send_interval <= 0.0 {
            return Err(Error::InvalidSettings(format!(
                "send_interval must be finite and > 0, got {}",
                self.send_interval
            )));
        }
        if !self.full_resync_interval.is_finite() || self.full_resync_interval < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "full_resync_interval must be finite and >= 0, got {}",
                self.full_resync_interval
            )));
        }
        if !self.rotation_sensitivity.is_finite() || self.rotation_sensitivity < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "rotation_sensitivity must be finite and >= 0, got {}",
                self.rotation_sensitivity
            )));
        }
        if self.delta_compression && self.channel == Channel::Unreliable {
            return Err(Error::InvalidSettings(
                "delta_compression requires the reliable channel".to_string(),
            ));
        }
        self.snapshot.validate()?;
        Ok(())
    }

    /// Playback delay for remote entities
    pub fn buffer_time(&self) -> f64 {
        self.snapshot.buffer_time(self.send_interval)
    }
}

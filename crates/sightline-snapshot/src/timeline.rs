//! Remote timeline tracking
//!
//! Each remote peer gets a [`Timeline`]: our running estimate of "their time
//! minus the playback delay", advanced every frame and nudged on every
//! snapshot so the buffer neither drains nor overfills.
//!
//! ```text
//!   remote: ──s1────s2────s3────s4──▶      newest remote_time
//!                         ▲        │
//!                         │◀──────▶│ buffer_time
//!                  local_timeline
//! ```
//!
//! Drift (how far the timeline trails the newest snapshot) is smoothed with
//! an [`Ema`]. When it leaves the threshold band, the timescale speeds up or
//! slows down playback by a few percent until it returns.

use crate::SnapshotSettings;
use log::debug;

/// Exponential moving average with running variance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    alpha: f64,
    initialized: bool,
    value: f64,
    variance: f64,
}

impl Ema {
    /// Average over roughly the last `n` samples
    pub fn new(n: usize) -> Self {
        Self {
            alpha: 2.0 / (n as f64 + 1.0),
            initialized: false,
            value: 0.0,
            variance: 0.0,
        }
    }

    pub fn add(&mut self, sample: f64) {
        if self.initialized {
            let delta = sample - self.value;
            self.value += self.alpha * delta;
            self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * delta * delta);
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn reset(&mut self) {
        *self = Self {
            alpha: self.alpha,
            ..Self::new(1)
        };
    }
}

/// Pick a playback speed from the smoothed drift
///
/// Drift above `positive_threshold` means we trail too far behind and speed
/// up; below `negative_threshold` means we are too close and slow down.
pub fn timescale(
    drift: f64,
    catchup_speed: f64,
    slowdown_speed: f64,
    negative_threshold: f64,
    positive_threshold: f64,
) -> f64 {
    if drift > positive_threshold {
        1.0 + catchup_speed
    } else if drift < negative_threshold {
        1.0 - slowdown_speed
    } else {
        1.0
    }
}

/// Buffer multiplier that absorbs the measured delivery jitter
pub fn dynamic_adjustment(send_interval: f64, jitter_std_dev: f64, tolerance: f64) -> f64 {
    let interval_with_jitter = send_interval + jitter_std_dev;
    interval_with_jitter / send_interval + tolerance
}

/// Keep the timeline within one buffer time of where it should be
pub fn timeline_clamp(local_timeline: f64, buffer_time: f64, latest_remote_time: f64) -> f64 {
    let target = latest_remote_time - buffer_time;
    local_timeline.clamp(target - buffer_time, target + buffer_time)
}

/// Playback clock for snapshots from one remote peer
#[derive(Debug, Clone)]
pub struct Timeline {
    send_interval: f64,
    buffer_time_multiplier: f64,
    catchup_speed: f64,
    slowdown_speed: f64,
    catchup_negative_threshold: f64,
    catchup_positive_threshold: f64,
    dynamic: bool,
    dynamic_tolerance: f64,

    local_timeline: f64,
    timescale: f64,
    drift_ema: Ema,
    delivery_time_ema: Ema,
    /// `(remote_time, local_time)` of the newest accepted snapshot
    latest: Option<(f64, f64)>,
}

impl Timeline {
    /// Create a timeline for a peer sending every `send_interval` seconds
    pub fn new(send_interval: f64, settings: &SnapshotSettings) -> Self {
        let send_rate = if send_interval > 0.0 {
            1.0 / send_interval
        } else {
            1.0
        };
        let samples = |duration: f64| ((send_rate * duration).ceil() as usize).max(1);

        Self {
            send_interval,
            buffer_time_multiplier: settings.buffer_time_multiplier,
            catchup_speed: settings.catchup_speed,
            slowdown_speed: settings.slowdown_speed,
            catchup_negative_threshold: settings.catchup_negative_threshold,
            catchup_positive_threshold: settings.catchup_positive_threshold,
            dynamic: settings.dynamic_adjustment,
            dynamic_tolerance: settings.dynamic_adjustment_tolerance,
            local_timeline: 0.0,
            timescale: 1.0,
            drift_ema: Ema::new(samples(settings.drift_ema_duration)),
            delivery_time_ema: Ema::new(samples(settings.delivery_time_ema_duration)),
            latest: None,
        }
    }

    /// Current playback time in the remote clock
    pub fn local_time(&self) -> f64 {
        self.local_timeline
    }

    pub fn timescale(&self) -> f64 {
        self.timescale
    }

    pub fn buffer_time_multiplier(&self) -> f64 {
        self.buffer_time_multiplier
    }

    /// Playback delay in seconds
    pub fn buffer_time(&self) -> f64 {
        self.send_interval * self.buffer_time_multiplier
    }

    /// Remote time of the newest accepted snapshot
    pub fn latest_remote_time(&self) -> Option<f64> {
        self.latest.map(|(remote, _)| remote)
    }

    /// Measured delivery interval jitter
    pub fn jitter(&self) -> f64 {
        self.delivery_time_ema.standard_deviation()
    }

    /// Feed the arrival of a snapshot stamped `remote_time` at `local_time`
    ///
    /// Returns `false` when the timestamp is not newer than the newest seen,
    /// in which case nothing changes.
    pub fn insert_and_adjust(&mut self, remote_time: f64, local_time: f64) -> bool {
        let Some((latest_remote, latest_local)) = self.latest else {
            self.latest = Some((remote_time, local_time));
            self.local_timeline = remote_time - self.buffer_time();
            return true;
        };
        if remote_time <= latest_remote {
            return false;
        }

        if self.dynamic {
            self.buffer_time_multiplier =
                dynamic_adjustment(self.send_interval, self.jitter(), self.dynamic_tolerance);
        }

        self.delivery_time_ema.add(local_time - latest_local);
        self.latest = Some((remote_time, local_time));

        let buffer_time = self.buffer_time();
        self.local_timeline = timeline_clamp(self.local_timeline, buffer_time, remote_time);

        self.drift_ema.add(remote_time - self.local_timeline);
        let drift = self.drift_ema.value() - buffer_time;

        let previous = self.timescale;
        self.timescale = timescale(
            drift,
            self.catchup_speed,
            self.slowdown_speed,
            self.send_interval * self.catchup_negative_threshold,
            self.send_interval * self.catchup_positive_threshold,
        );
        if self.timescale != previous {
            debug!(
                "Timeline timescale {} -> {} (drift {:.4}s)",
                previous, self.timescale, drift
            );
        }
        true
    }

    /// Advance playback by `delta_time` seconds of local time
    pub fn advance(&mut self, delta_time: f64) {
        self.local_timeline += delta_time * self.timescale;
    }

    /// Forget everything; the next snapshot re-anchors the timeline
    pub fn reset(&mut self) {
        self.local_timeline = 0.0;
        self.timescale = 1.0;
        self.drift_ema.reset();
        self.delivery_time_ema.reset();
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_settings() -> SnapshotSettings {
        SnapshotSettings {
            dynamic_adjustment: false,
            ..Default::default()
        }
    }

    // ========================================================================
    // Ema
    // ========================================================================

    #[test]
    fn test_ema_first_sample_is_value() {
        let mut ema = Ema::new(3);
        assert!(!ema.is_initialized());
        ema.add(5.0);
        assert_eq!(ema.value(), 5.0);
        assert_eq!(ema.variance(), 0.0);
    }

    #[test]
    fn test_ema_moves_towards_samples() {
        // alpha = 2 / (3 + 1) = 0.5
        let mut ema = Ema::new(3);
        ema.add(0.0);
        ema.add(4.0);
        assert_eq!(ema.value(), 2.0);
        // (1 - 0.5) * (0 + 0.5 * 16)
        assert_eq!(ema.variance(), 4.0);
        assert_eq!(ema.standard_deviation(), 2.0);

        ema.reset();
        assert!(!ema.is_initialized());
        ema.add(1.0);
        ema.add(3.0);
        assert_eq!(ema.value(), 2.0);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    #[test]
    fn test_timescale_bands() {
        assert_eq!(timescale(0.5, 0.02, 0.04, -0.1, 0.1), 1.02);
        assert_eq!(timescale(-0.5, 0.02, 0.04, -0.1, 0.1), 0.96);
        assert_eq!(timescale(0.05, 0.02, 0.04, -0.1, 0.1), 1.0);
    }

    #[test]
    fn test_dynamic_adjustment() {
        assert_eq!(dynamic_adjustment(0.1, 0.0, 1.0), 2.0);
        assert!((dynamic_adjustment(0.1, 0.05, 1.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_timeline_clamp() {
        // target = 10 - 1 = 9, band [8, 10]
        assert_eq!(timeline_clamp(5.0, 1.0, 10.0), 8.0);
        assert_eq!(timeline_clamp(9.5, 1.0, 10.0), 9.5);
        assert_eq!(timeline_clamp(12.0, 1.0, 10.0), 10.0);
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    #[test]
    fn test_first_snapshot_anchors_timeline() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        assert!(timeline.insert_and_adjust(5.0, 100.0));
        assert!((timeline.local_time() - 4.8).abs() < 1e-12);
        assert_eq!(timeline.latest_remote_time(), Some(5.0));
    }

    #[test]
    fn test_old_snapshots_are_ignored() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        timeline.insert_and_adjust(5.0, 100.0);
        assert!(!timeline.insert_and_adjust(5.0, 100.1));
        assert!(!timeline.insert_and_adjust(4.9, 100.1));
        assert_eq!(timeline.latest_remote_time(), Some(5.0));
    }

    #[test]
    fn test_advance_uses_timescale() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        timeline.insert_and_adjust(1.0, 1.0);
        let start = timeline.local_time();
        timeline.advance(0.5);
        assert!((timeline.local_time() - (start + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_lagging_timeline_catches_up() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        timeline.insert_and_adjust(0.0, 0.0);

        // Snapshots keep arriving but playback never advances
        for i in 1..=20 {
            let time = i as f64 * 0.1;
            timeline.insert_and_adjust(time, time);
        }

        assert_eq!(timeline.timescale(), 1.02);
        // Clamped to at most two buffer times behind the newest snapshot
        assert!(timeline.local_time() >= 2.0 - 0.4 - 1e-9);
    }

    #[test]
    fn test_leading_timeline_slows_down() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        timeline.insert_and_adjust(0.0, 0.0);

        for i in 1..=20 {
            let time = i as f64 * 0.1;
            // Playback runs ahead of the arrivals
            timeline.advance(0.2);
            timeline.insert_and_adjust(time, time);
        }

        assert_eq!(timeline.timescale(), 0.96);
    }

    #[test]
    fn test_dynamic_adjustment_tracks_jitter() {
        let mut timeline = Timeline::new(0.1, &SnapshotSettings::default());
        let arrivals = [0.0, 0.05, 0.3, 0.32, 0.5, 0.7, 0.61, 0.9];
        for (i, local) in arrivals.iter().enumerate() {
            timeline.insert_and_adjust(i as f64 * 0.1, *local);
        }

        assert!(timeline.jitter() > 0.0);
        assert!(timeline.buffer_time_multiplier() > 2.0);
    }

    #[test]
    fn test_reset_reanchors() {
        let mut timeline = Timeline::new(0.1, &fixed_settings());
        timeline.insert_and_adjust(1.0, 1.0);
        timeline.reset();
        assert_eq!(timeline.latest_remote_time(), None);

        timeline.insert_and_adjust(50.0, 2.0);
        assert!((timeline.local_time() - 49.8).abs() < 1e-12);
    }
}

//! Ordered snapshot buffer with interpolation stepping
//!
//! A `SnapshotBuffer` holds the snapshots received for one entity in one
//! direction, strictly ordered by `remote_time` with no duplicates. Playback
//! walks forward through it:
//!
//! ```text
//!   remote_time:   1.0      1.1      1.2      1.3
//!                   │        │   ▲    │        │
//!                   │        │   │    │        │
//!                evicted    from │   to        │
//!                          playback_time (t = 0.5)
//! ```
//!
//! Snapshots older than the `from` endpoint are evicted on every step.

use crate::snapshot::TransformSnapshot;
use crate::DEFAULT_BUFFER_LIMIT;
use sightline_core::{Pose, Quat, Sample, Vec3};

/// Result of stepping playback: blend `from` towards `to` by `t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub from: TransformSnapshot,
    pub to: TransformSnapshot,
    pub t: f64,
}

impl Interpolation {
    /// The blended snapshot
    pub fn snapshot(&self) -> TransformSnapshot {
        TransformSnapshot::interpolate(&self.from, &self.to, self.t)
    }

    /// The blended pose
    pub fn pose(&self) -> Pose {
        self.snapshot().pose()
    }
}

/// Per-entity, per-direction snapshot buffer
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    /// Sorted by `remote_time`, unique
    snapshots: Vec<TransformSnapshot>,
    /// Maximum number of buffered snapshots
    limit: usize,
    /// Cap on `t` past the newest snapshot
    extrapolation_limit: Option<f64>,
}

impl SnapshotBuffer {
    /// Create a buffer holding at most `limit` snapshots
    ///
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            limit: limit.max(1),
            extrapolation_limit: None,
        }
    }

    /// Cap the interpolation factor handed out past the newest snapshot
    pub fn with_extrapolation_limit(mut self, limit: Option<f64>) -> Self {
        self.extrapolation_limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Buffered snapshots, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TransformSnapshot> {
        self.snapshots.iter()
    }

    pub fn oldest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.first()
    }

    pub fn newest(&self) -> Option<&TransformSnapshot> {
        self.snapshots.last()
    }

    /// Insert a snapshot in `remote_time` order
    ///
    /// Returns `false` without changing anything if a snapshot with the same
    /// `remote_time` is already buffered or the buffer is full.
    pub fn insert_if_not_exists(&mut self, snapshot: TransformSnapshot) -> bool {
        if self.snapshots.len() >= self.limit {
            return false;
        }
        match self
            .snapshots
            .binary_search_by(|s| s.remote_time.total_cmp(&snapshot.remote_time))
        {
            Ok(_) => false,
            Err(index) => {
                self.snapshots.insert(index, snapshot);
                true
            }
        }
    }

    /// Build a snapshot from a sync message and insert it
    ///
    /// Unchanged components are taken from the newest buffered snapshot, or
    /// from `live` when the buffer is empty.
    pub fn add_snapshot(
        &mut self,
        remote_time: f64,
        local_time: f64,
        position: Sample<Vec3>,
        rotation: Sample<Quat>,
        scale: Sample<Vec3>,
        live: &Pose,
    ) -> bool {
        let base = self.newest().map(|s| s.pose()).unwrap_or(*live);
        let pose = Pose::new(
            position.or(base.position),
            rotation.or(base.rotation),
            scale.or(base.scale),
        );
        self.insert_if_not_exists(TransformSnapshot::new(remote_time, local_time, pose))
    }

    /// Find the snapshots bracketing `playback_time` and evict older ones
    ///
    /// - empty buffer: `None`
    /// - one snapshot, or `playback_time` before the oldest: that snapshot
    ///   as both endpoints with `t = 0`
    /// - past the newest: the newest pair with `t >= 1`
    pub fn step_interpolation(&mut self, playback_time: f64) -> Option<Interpolation> {
        let count = self.snapshots.len();
        let oldest = *self.snapshots.first()?;

        if count == 1 || playback_time < oldest.remote_time {
            return Some(Interpolation {
                from: oldest,
                to: oldest,
                t: 0.0,
            });
        }

        // Last index whose remote_time <= playback_time, capped so a `to`
        // snapshot always exists
        let at_or_before = self
            .snapshots
            .partition_point(|s| s.remote_time <= playback_time);
        let from_index = (at_or_before - 1).min(count - 2);

        let from = self.snapshots[from_index];
        let to = self.snapshots[from_index + 1];
        let mut t = inverse_lerp(from.remote_time, to.remote_time, playback_time);
        if let Some(limit) = self.extrapolation_limit {
            t = t.min(limit);
        }

        self.snapshots.drain(..from_index);
        Some(Interpolation { from, to, t })
    }

    /// Drop every buffered snapshot
    pub fn reset(&mut self) {
        self.snapshots.clear();
    }

    /// Whether `remote_time` is so far past the newest buffered snapshot that
    /// the buffer no longer describes recent motion
    ///
    /// An empty buffer never needs correction.
    pub fn needs_correction(&self, remote_time: f64, threshold: f64) -> bool {
        self.newest()
            .is_some_and(|newest| remote_time - newest.remote_time > threshold)
    }

    /// Replace the buffer with a single snapshot of `live`, one send interval
    /// before the incoming message
    ///
    /// Interpolation then runs from where the entity is now towards the new
    /// state instead of replaying stale motion.
    pub fn rewrite_history(
        &mut self,
        live: &Pose,
        remote_time: f64,
        local_time: f64,
        send_interval: f64,
    ) {
        self.snapshots.clear();
        self.snapshots.push(TransformSnapshot::new(
            remote_time - send_interval,
            local_time - send_interval,
            *live,
        ));
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            limit: self.limit,
            count: self.snapshots.len(),
            oldest_remote_time: self.oldest().map_or(0.0, |s| s.remote_time),
            newest_remote_time: self.newest().map_or(0.0, |s| s.remote_time),
        }
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LIMIT)
    }
}

fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    if a == b {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// Statistics about a snapshot buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStats {
    /// Maximum number of snapshots
    pub limit: usize,
    /// Current number of buffered snapshots
    pub count: usize,
    /// Remote time of the oldest snapshot
    pub oldest_remote_time: f64,
    /// Remote time of the newest snapshot
    pub newest_remote_time: f64,
}

impl BufferStats {
    /// Remote time covered by the buffer
    pub fn span(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.newest_remote_time - self.oldest_remote_time
        }
    }

    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.limit as f32
    }
}

//! Timestamped transform snapshots

use serde::{Deserialize, Serialize};
use sightline_core::{Pose, Quat, Vec3};

/// One received transform state
///
/// `remote_time` is the sender's clock when the state was sampled,
/// `local_time` is our clock when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    pub remote_time: f64,
    pub local_time: f64,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl TransformSnapshot {
    pub fn new(remote_time: f64, local_time: f64, pose: Pose) -> Self {
        Self {
            remote_time,
            local_time,
            position: pose.position,
            rotation: pose.rotation,
            scale: pose.scale,
        }
    }

    /// The transform carried by this snapshot
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation, self.scale)
    }

    /// Blend two snapshots
    ///
    /// Position and scale are lerped, rotation is slerped. `t` is not
    /// clamped: values above 1 extrapolate past `to`.
    pub fn interpolate(from: &TransformSnapshot, to: &TransformSnapshot, t: f64) -> TransformSnapshot {
        let tf = t as f32;
        TransformSnapshot {
            remote_time: from.remote_time + (to.remote_time - from.remote_time) * t,
            local_time: from.local_time + (to.local_time - from.local_time) * t,
            position: from.position.lerp(to.position, tf),
            rotation: from.rotation.slerp(to.rotation, tf),
            scale: from.scale.lerp(to.scale, tf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(time: f64, x: f32) -> TransformSnapshot {
        TransformSnapshot::new(time, time, Pose::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = snap(1.0, 0.0);
        let b = snap(2.0, 10.0);
        let mid = TransformSnapshot::interpolate(&a, &b, 0.5);

        assert_eq!(mid.position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(mid.remote_time, 1.5);
        assert_eq!(mid.scale, Vec3::ONE);
    }

    #[test]
    fn test_interpolate_extrapolates() {
        let a = snap(1.0, 0.0);
        let b = snap(2.0, 10.0);
        let past = TransformSnapshot::interpolate(&a, &b, 1.5);
        assert_eq!(past.position, Vec3::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn test_interpolate_rotation() {
        let mut a = snap(0.0, 0.0);
        let mut b = snap(1.0, 0.0);
        a.rotation = Quat::IDENTITY;
        b.rotation = Quat::from_rotation_y(1.0);

        let mid = TransformSnapshot::interpolate(&a, &b, 0.5);
        assert!(mid.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-4);
    }
}

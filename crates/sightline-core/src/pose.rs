//! Transform state of a replicated entity

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Pose {
    /// Identity pose at the origin
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a pose from its three components
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Identity rotation and unit scale at `position`
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One component of a sync message: either unchanged since the last send,
/// or carrying a new value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sample<T> {
    #[default]
    Unchanged,
    Changed(T),
}

impl<T> Sample<T> {
    /// The carried value, or `fallback` when unchanged
    pub fn or(self, fallback: T) -> T {
        match self {
            Sample::Unchanged => fallback,
            Sample::Changed(value) => value,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Sample::Changed(_))
    }

    /// Convert to an `Option`, `None` meaning unchanged
    pub fn changed(self) -> Option<T> {
        match self {
            Sample::Unchanged => None,
            Sample::Changed(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Sample<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Sample::Changed(v),
            None => Sample::Unchanged,
        }
    }
}

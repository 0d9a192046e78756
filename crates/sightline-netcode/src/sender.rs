//! Broadcast-side state for one entity
//!
//! The sender decides, once per send interval, whether the entity's pose
//! changed enough to be worth a message and remembers what it last sent.
//! That memory is the delta baseline every receiver mirrors.

use crate::message::{Baseline, SyncMessage};
use crate::settings::ReplicationSettings;
use sightline_codec::{has_changed, quantize, QuantizedVec3};
use sightline_core::{EntityId, Pose, Quat};

/// What one broadcast tick decided for an entity
#[derive(Debug, Clone, PartialEq)]
pub enum SendDecision {
    /// The send interval has not elapsed yet
    Wait,
    /// Interval elapsed, nothing to say
    Skip,
    /// Encode `message` against `baseline` and send it
    Send {
        message: SyncMessage,
        baseline: Baseline,
    },
}

/// Last sent quantized state
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sent {
    position: QuantizedVec3,
    rotation: Quat,
    scale: QuantizedVec3,
}

/// Send scheduling and baseline for one entity
#[derive(Debug, Clone, Default)]
pub struct TransformSender {
    last_send: Option<f64>,
    last_full: Option<f64>,
    sent: Option<Sent>,
    /// The previous send already confirmed an unchanged pose
    confirmed_unchanged: bool,
}

impl TransformSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything has been sent yet
    pub fn has_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// The baseline receivers hold after the last send
    pub fn baseline(&self) -> Option<Baseline> {
        self.sent.map(|sent| Baseline {
            position: sent.position,
            scale: sent.scale,
        })
    }

    /// Sample `pose` at `now` and decide what to send
    ///
    /// The returned baseline is the one the message must be encoded
    /// against; the sender has already moved on to the new one.
    pub fn tick(
        &mut self,
        entity: EntityId,
        now: f64,
        pose: &Pose,
        settings: &ReplicationSettings,
    ) -> SendDecision {
        if let Some(last) = self.last_send {
            if now < last + settings.send_interval {
                return SendDecision::Wait;
            }
        }
        self.last_send = Some(now);

        let current = Sent {
            position: quantize(pose.position, settings.position_precision),
            rotation: pose.rotation,
            scale: quantize(pose.scale, settings.scale_precision),
        };

        let Some(previous) = self.sent else {
            return self.send_full(entity, now, current, settings);
        };
        let resync_due = settings.full_resync_interval > 0.0
            && self
                .last_full
                .map_or(true, |last| now >= last + settings.full_resync_interval);
        if resync_due {
            return self.send_full(entity, now, current, settings);
        }

        let position_changed =
            settings.sync_position && has_changed(previous.position, current.position);
        let rotation_changed = settings.sync_rotation
            && previous.rotation.angle_between(current.rotation).to_degrees()
                > settings.rotation_sensitivity;
        let scale_changed = settings.sync_scale && has_changed(previous.scale, current.scale);

        if position_changed || rotation_changed || scale_changed {
            if !settings.delta_compression {
                return self.send_full(entity, now, current, settings);
            }
            let message = SyncMessage {
                entity,
                full: false,
                position: position_changed.then_some(current.position),
                rotation: rotation_changed.then_some(current.rotation),
                scale: scale_changed.then_some(current.scale),
            };
            return self.commit(message);
        }

        if settings.only_sync_on_change && self.confirmed_unchanged {
            return SendDecision::Skip;
        }
        self.confirmed_unchanged = true;
        SendDecision::Send {
            message: SyncMessage::unchanged(entity),
            baseline: self.baseline().unwrap_or_default(),
        }
    }

    /// Full message repeating the last sent state, for a new observer
    ///
    /// Encoding it does not touch the shared baseline, so it can go to
    /// one connection while everyone else keeps receiving deltas.
    pub fn initial_message(
        &self,
        entity: EntityId,
        settings: &ReplicationSettings,
    ) -> Option<SyncMessage> {
        let sent = self.sent?;
        Some(SyncMessage {
            entity,
            full: true,
            position: settings.sync_position.then_some(sent.position),
            rotation: settings.sync_rotation.then_some(sent.rotation),
            scale: settings.sync_scale.then_some(sent.scale),
        })
    }

    /// Forget the send history; the next tick sends a full message
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn send_full(
        &mut self,
        entity: EntityId,
        now: f64,
        current: Sent,
        settings: &ReplicationSettings,
    ) -> SendDecision {
        self.last_full = Some(now);
        let message = SyncMessage {
            entity,
            full: true,
            position: settings.sync_position.then_some(current.position),
            rotation: settings.sync_rotation.then_some(current.rotation),
            scale: settings.sync_scale.then_some(current.scale),
        };
        self.commit(message)
    }

    /// Make `message` the new baseline and hand it out for sending
    fn commit(&mut self, message: SyncMessage) -> SendDecision {
        let baseline = self.baseline().unwrap_or_default();
        let previous = self.sent;
        self.sent = Some(Sent {
            position: message
                .position
                .or(previous.map(|p| p.position))
                .unwrap_or_default(),
            rotation: message
                .rotation
                .or(previous.map(|p| p.rotation))
                .unwrap_or(Quat::IDENTITY),
            scale: message
                .scale
                .or(previous.map(|p| p.scale))
                .unwrap_or_default(),
        });
        self.confirmed_unchanged = false;
        SendDecision::Send { message, baseline }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::Vec3;

    fn settings() -> ReplicationSettings {
        ReplicationSettings {
            send_interval: 0.125,
            ..Default::default()
        }
    }

    /// Time of the n-th send interval
    fn at(step: u32) -> f64 {
        f64::from(step) * 0.125
    }

    fn sends(decision: &SendDecision) -> Option<&SyncMessage> {
        match decision {
            SendDecision::Send { message, .. } => Some(message),
            _ => None,
        }
    }

    // ===== Scheduling =====

    #[test]
    fn test_first_send_is_full() {
        let mut sender = TransformSender::new();
        let decision = sender.tick(EntityId(1), 0.0, &Pose::at(Vec3::X), &settings());
        let message = sends(&decision).unwrap();
        assert!(message.full);
        assert_eq!(message.position, Some(QuantizedVec3::new(100, 0, 0)));
        assert!(message.rotation.is_some());
        // Scale sync is off by default
        assert!(message.scale.is_none());
    }

    #[test]
    fn test_waits_for_interval() {
        let mut sender = TransformSender::new();
        let settings = settings();
        sender.tick(EntityId(1), 0.0, &Pose::IDENTITY, &settings);
        let moved = Pose::at(Vec3::X);
        assert_eq!(
            sender.tick(EntityId(1), 0.0625, &moved, &settings),
            SendDecision::Wait
        );
        assert!(sends(&sender.tick(EntityId(1), at(1), &moved, &settings)).is_some());
    }

    // ===== Change policy =====

    #[test]
    fn test_exactly_one_confirming_send() {
        let mut sender = TransformSender::new();
        let settings = settings();
        let pose = Pose::at(Vec3::new(3.0, 0.0, 1.0));
        sender.tick(EntityId(1), 0.0, &pose, &settings);

        let confirm = sender.tick(EntityId(1), at(1), &pose, &settings);
        assert!(sends(&confirm).unwrap().is_unchanged());
        for step in 2..10 {
            let decision = sender.tick(EntityId(1), at(step), &pose, &settings);
            assert_eq!(decision, SendDecision::Skip);
        }

        // Moving again re-arms the confirmation
        let moved = Pose::at(Vec3::new(3.5, 0.0, 1.0));
        assert!(!sends(&sender.tick(EntityId(1), at(10), &moved, &settings))
            .unwrap()
            .is_unchanged());
        assert!(sends(&sender.tick(EntityId(1), at(11), &moved, &settings))
            .unwrap()
            .is_unchanged());
        assert_eq!(
            sender.tick(EntityId(1), at(12), &moved, &settings),
            SendDecision::Skip
        );
    }

    #[test]
    fn test_always_send_when_not_only_on_change() {
        let mut sender = TransformSender::new();
        let settings = ReplicationSettings {
            only_sync_on_change: false,
            ..settings()
        };
        for step in 0..5 {
            let decision = sender.tick(EntityId(1), at(step), &Pose::IDENTITY, &settings);
            assert!(sends(&decision).is_some());
        }
    }

    #[test]
    fn test_sub_precision_motion_is_unchanged() {
        let mut sender = TransformSender::new();
        let settings = settings();
        sender.tick(EntityId(1), 0.0, &Pose::IDENTITY, &settings);
        sender.tick(EntityId(1), at(1), &Pose::IDENTITY, &settings);

        // 1mm at centimeter precision
        let nudged = Pose::at(Vec3::new(0.001, 0.0, 0.0));
        assert_eq!(
            sender.tick(EntityId(1), at(2), &nudged, &settings),
            SendDecision::Skip
        );
    }

    #[test]
    fn test_rotation_sensitivity() {
        let mut sender = TransformSender::new();
        let settings = ReplicationSettings {
            rotation_sensitivity: 5.0,
            ..settings()
        };
        sender.tick(EntityId(1), 0.0, &Pose::IDENTITY, &settings);
        sender.tick(EntityId(1), at(1), &Pose::IDENTITY, &settings);

        let mut pose = Pose::IDENTITY;
        pose.rotation = Quat::from_rotation_y(2f32.to_radians());
        assert_eq!(sender.tick(EntityId(1), at(2), &pose, &settings), SendDecision::Skip);

        pose.rotation = Quat::from_rotation_y(10f32.to_radians());
        let decision = sender.tick(EntityId(1), at(3), &pose, &settings);
        let message = sends(&decision).unwrap();
        assert!(message.rotation.is_some());
        assert!(message.position.is_none());
    }

    // ===== Baselines =====

    #[test]
    fn test_delta_baseline_is_previous_send() {
        let mut sender = TransformSender::new();
        let settings = settings();
        sender.tick(EntityId(1), 0.0, &Pose::at(Vec3::X), &settings);

        let decision = sender.tick(EntityId(1), at(1), &Pose::at(Vec3::Y), &settings);
        let SendDecision::Send { message, baseline } = decision else {
            panic!("expected a send");
        };
        assert!(!message.full);
        assert_eq!(baseline.position, QuantizedVec3::new(100, 0, 0));
        assert_eq!(message.position, Some(QuantizedVec3::new(0, 100, 0)));
        assert_eq!(
            sender.baseline().map(|b| b.position),
            Some(QuantizedVec3::new(0, 100, 0))
        );
    }

    #[test]
    fn test_full_resync_interval() {
        let mut sender = TransformSender::new();
        let settings = ReplicationSettings {
            full_resync_interval: 0.5,
            ..settings()
        };
        let mut fulls = 0;
        for step in 0..11 {
            let pose = Pose::at(Vec3::new(step as f32, 0.0, 0.0));
            let decision = sender.tick(EntityId(1), at(step), &pose, &settings);
            if sends(&decision).is_some_and(|m| m.full) {
                fulls += 1;
            }
        }
        // Steps 0, 4 and 8
        assert_eq!(fulls, 3);
    }

    #[test]
    fn test_initial_message_repeats_last_send() {
        let mut sender = TransformSender::new();
        let settings = settings();
        assert!(sender.initial_message(EntityId(1), &settings).is_none());

        sender.tick(EntityId(1), 0.0, &Pose::at(Vec3::X), &settings);
        sender.tick(EntityId(1), at(1), &Pose::at(Vec3::Z), &settings);
        let initial = sender.initial_message(EntityId(1), &settings).unwrap();
        assert!(initial.full);
        assert_eq!(initial.position, Some(QuantizedVec3::new(0, 0, 100)));

        sender.reset();
        assert!(!sender.has_sent());
    }
}

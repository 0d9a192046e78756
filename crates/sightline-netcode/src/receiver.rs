//! Receive-side state for one entity

use crate::message::{Baseline, SyncMessage};
use crate::settings::ReplicationSettings;
use log::debug;
use sightline_codec::dequantize;
use sightline_core::{ConnectionId, Pose, Sample};
use sightline_snapshot::SnapshotBuffer;

/// What feeding one sync message into a buffer did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReceiveOutcome {
    /// The snapshot was buffered (false for duplicates or a full buffer)
    pub inserted: bool,
    /// Gap in seconds that made the buffer stale, if it was rewritten
    pub corrected: Option<f64>,
}

/// Decoder baseline and source of one remote entity
#[derive(Debug, Clone, PartialEq)]
pub struct TransformReceiver {
    source: ConnectionId,
    baseline: Option<Baseline>,
}

impl TransformReceiver {
    pub fn new(source: ConnectionId) -> Self {
        Self {
            source,
            baseline: None,
        }
    }

    /// Connection whose timeline plays this entity back
    pub fn source(&self) -> ConnectionId {
        self.source
    }

    pub fn set_source(&mut self, source: ConnectionId) {
        self.source = source;
    }

    /// Last decoded quantized values, once a full message has arrived
    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// Apply a decoded sync message to `buffer`
    ///
    /// Moves the baseline forward, rewrites a stale buffer from `live`, then
    /// buffers the dequantized state. Unchanged groups repeat the newest
    /// buffered values.
    pub fn receive(
        &mut self,
        buffer: &mut SnapshotBuffer,
        message: &SyncMessage,
        remote_time: f64,
        local_time: f64,
        live: &Pose,
        settings: &ReplicationSettings,
    ) -> ReceiveOutcome {
        self.baseline = Some(message.apply_to(self.baseline.unwrap_or_default()));

        let mut outcome = ReceiveOutcome::default();
        let threshold = settings.snapshot.correction_threshold(settings.send_interval);
        if buffer.needs_correction(remote_time, threshold) {
            let gap = buffer
                .newest()
                .map_or(0.0, |newest| remote_time - newest.remote_time);
            debug!(
                "{}: buffer stale by {:.3}s (threshold {:.3}s), rewriting history",
                message.entity, gap, threshold
            );
            buffer.rewrite_history(live, remote_time, local_time, settings.send_interval);
            outcome.corrected = Some(gap);
        }

        let position: Sample<_> = message
            .position
            .map(|q| dequantize(q, settings.position_precision))
            .into();
        let rotation: Sample<_> = message.rotation.into();
        let scale: Sample<_> = message
            .scale
            .map(|q| dequantize(q, settings.scale_precision))
            .into();

        outcome.inserted =
            buffer.add_snapshot(remote_time, local_time, position, rotation, scale, live);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_codec::QuantizedVec3;
    use sightline_core::{EntityId, Quat, Vec3};

    fn full(x: i64) -> SyncMessage {
        SyncMessage {
            entity: EntityId(1),
            full: true,
            position: Some(QuantizedVec3::new(x, 0, 0)),
            rotation: Some(Quat::IDENTITY),
            scale: None,
        }
    }

    #[test]
    fn test_baseline_follows_messages() {
        let settings = ReplicationSettings::default();
        let mut receiver = TransformReceiver::new(ConnectionId::SERVER);
        let mut buffer = SnapshotBuffer::new(8);
        assert!(receiver.baseline().is_none());

        receiver.receive(&mut buffer, &full(250), 1.0, 1.0, &Pose::IDENTITY, &settings);
        assert_eq!(
            receiver.baseline().map(|b| b.position),
            Some(QuantizedVec3::new(250, 0, 0))
        );

        // Unchanged keeps the baseline and repeats the newest snapshot
        let outcome = receiver.receive(
            &mut buffer,
            &SyncMessage::unchanged(EntityId(1)),
            1.02,
            1.02,
            &Pose::IDENTITY,
            &settings,
        );
        assert!(outcome.inserted);
        assert_eq!(
            receiver.baseline().map(|b| b.position),
            Some(QuantizedVec3::new(250, 0, 0))
        );
        let newest = buffer.newest().unwrap();
        assert!((newest.position.x - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_stale_buffer_rewritten() {
        let settings = ReplicationSettings {
            send_interval: 0.1,
            ..Default::default()
        };
        let mut receiver = TransformReceiver::new(ConnectionId::SERVER);
        let mut buffer = SnapshotBuffer::new(8);
        receiver.receive(&mut buffer, &full(0), 1.0, 1.0, &Pose::IDENTITY, &settings);

        // Five seconds of silence, far past the 0.2s threshold
        let live = Pose::at(Vec3::new(0.5, 0.0, 0.0));
        let outcome = receiver.receive(&mut buffer, &full(100), 6.0, 6.0, &live, &settings);
        assert!(outcome.inserted);
        assert!((outcome.corrected.unwrap() - 5.0).abs() < 1e-9);

        let times: Vec<f64> = buffer.iter().map(|s| s.remote_time).collect();
        assert_eq!(times.len(), 2);
        assert!((times[0] - 5.9).abs() < 1e-9);
        assert_eq!(buffer.oldest().unwrap().position, live.position);
    }
}

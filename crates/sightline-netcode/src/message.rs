//! Replication wire format
//!
//! ```text
//! message   := kind:u8 entity:varint body
//! kind      := 0 Sync | 1 Teleport
//! Sync      := flags:u8 [position] [rotation] [scale]
//! Teleport  := position:3×f32 rotation:4×f32 scale:3×f32
//! ```
//!
//! Sync positions and scales are three signed varints: absolute quantized
//! values when `FULL` is set, otherwise deltas against the receiver's last
//! decoded baseline. Rotations are absolute, either a 32-bit smallest-three
//! or four raw `f32`. An absent group means "unchanged".

use crate::{Error, Result};
use bytes::{Buf, BufMut};
use sightline_codec::rotation::{
    read_compressed_rotation, read_raw_rotation, read_raw_vec3, write_compressed_rotation,
    write_raw_rotation, write_raw_vec3,
};
use sightline_codec::varint::{read_varint, write_varint};
use sightline_codec::{delta, CodecError, QuantizedVec3};
use sightline_core::{EntityId, Pose, Quat};

/// First byte of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Sync = 0,
    Teleport = 1,
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageKind::Sync),
            1 => Ok(MessageKind::Teleport),
            other => Err(Error::UnknownMessageKind(other)),
        }
    }
}

/// Sync message flag bits
pub mod flags {
    /// Position and scale are absolute, not deltas
    pub const FULL: u8 = 1 << 0;
    pub const POSITION: u8 = 1 << 1;
    pub const ROTATION: u8 = 1 << 2;
    pub const SCALE: u8 = 1 << 3;
    /// Rotation is a 32-bit smallest-three
    pub const ROTATION_COMPRESSED: u8 = 1 << 4;
}

/// Quantized values both peers agree on for delta coding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Baseline {
    pub position: QuantizedVec3,
    pub scale: QuantizedVec3,
}

/// Transform sync in absolute quantized terms
///
/// `None` groups are unchanged since the previous message.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub entity: EntityId,
    pub full: bool,
    pub position: Option<QuantizedVec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<QuantizedVec3>,
}

impl SyncMessage {
    /// A message that changes nothing
    pub fn unchanged(entity: EntityId) -> Self {
        Self {
            entity,
            full: false,
            position: None,
            rotation: None,
            scale: None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.position.is_none() && self.rotation.is_none() && self.scale.is_none()
    }

    /// The baseline after this message is applied on top of `baseline`
    pub fn apply_to(&self, baseline: Baseline) -> Baseline {
        Baseline {
            position: self.position.unwrap_or(baseline.position),
            scale: self.scale.unwrap_or(baseline.scale),
        }
    }

    /// Write the message, delta-coding against `baseline` unless `full`
    pub fn encode(&self, writer: &mut impl BufMut, baseline: &Baseline, compress_rotation: bool) {
        let mut bits = 0;
        if self.full {
            bits |= flags::FULL;
        }
        if self.position.is_some() {
            bits |= flags::POSITION;
        }
        if self.rotation.is_some() {
            bits |= flags::ROTATION;
            if compress_rotation {
                bits |= flags::ROTATION_COMPRESSED;
            }
        }
        if self.scale.is_some() {
            bits |= flags::SCALE;
        }

        writer.put_u8(MessageKind::Sync as u8);
        write_varint(writer, self.entity.raw());
        writer.put_u8(bits);

        let reference = |base: QuantizedVec3| {
            if self.full {
                QuantizedVec3::ZERO
            } else {
                base
            }
        };
        if let Some(position) = self.position {
            delta::encode(writer, reference(baseline.position), position);
        }
        if let Some(rotation) = self.rotation {
            if compress_rotation {
                write_compressed_rotation(writer, rotation);
            } else {
                write_raw_rotation(writer, rotation);
            }
        }
        if let Some(scale) = self.scale {
            delta::encode(writer, reference(baseline.scale), scale);
        }
    }
}

/// A decoded replication message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Sync(SyncMessage),
    Teleport { entity: EntityId, pose: Pose },
}

impl Message {
    pub fn entity(&self) -> EntityId {
        match self {
            Message::Sync(sync) => sync.entity,
            Message::Teleport { entity, .. } => *entity,
        }
    }

    /// Decode a payload
    ///
    /// `baseline_of` is asked for the receiver's baseline of the entity named
    /// in the header; it is only needed for delta-coded syncs.
    pub fn decode(
        mut payload: &[u8],
        baseline_of: impl FnOnce(EntityId) -> Option<Baseline>,
    ) -> Result<Message> {
        let (kind, entity) = read_header(&mut payload)?;
        match kind {
            MessageKind::Sync => {
                decode_sync(&mut payload, entity, baseline_of(entity)).map(Message::Sync)
            }
            MessageKind::Teleport => {
                let pose = decode_teleport(&mut payload)?;
                Ok(Message::Teleport { entity, pose })
            }
        }
    }
}

/// Write a teleport message
pub fn encode_teleport(writer: &mut impl BufMut, entity: EntityId, pose: &Pose) {
    writer.put_u8(MessageKind::Teleport as u8);
    write_varint(writer, entity.raw());
    write_raw_vec3(writer, pose.position);
    write_raw_rotation(writer, pose.rotation);
    write_raw_vec3(writer, pose.scale);
}

/// Read the message kind and entity id
pub fn read_header(reader: &mut impl Buf) -> Result<(MessageKind, EntityId)> {
    if !reader.has_remaining() {
        return Err(CodecError::UnexpectedEnd { needed: 1 }.into());
    }
    let kind = MessageKind::try_from(reader.get_u8())?;
    let entity = EntityId(read_varint(reader)?);
    Ok((kind, entity))
}

/// Read a sync body following the header
pub fn decode_sync(
    reader: &mut impl Buf,
    entity: EntityId,
    baseline: Option<Baseline>,
) -> Result<SyncMessage> {
    if !reader.has_remaining() {
        return Err(CodecError::UnexpectedEnd { needed: 1 }.into());
    }
    let bits = reader.get_u8();
    let full = bits & flags::FULL != 0;
    let has_deltas = bits & (flags::POSITION | flags::SCALE) != 0;

    let baseline = match baseline {
        _ if full => Baseline::default(),
        Some(baseline) => baseline,
        None if has_deltas => return Err(Error::MissingBaseline(entity)),
        None => Baseline::default(),
    };

    let position = if bits & flags::POSITION != 0 {
        Some(delta::decode(reader, baseline.position)?)
    } else {
        None
    };
    let rotation = if bits & flags::ROTATION == 0 {
        None
    } else if bits & flags::ROTATION_COMPRESSED != 0 {
        Some(read_compressed_rotation(reader)?)
    } else {
        Some(read_raw_rotation(reader)?)
    };
    let scale = if bits & flags::SCALE != 0 {
        Some(delta::decode(reader, baseline.scale)?)
    } else {
        None
    };

    Ok(SyncMessage {
        entity,
        full,
        position,
        rotation,
        scale,
    })
}

/// Read a teleport body following the header
pub fn decode_teleport(reader: &mut impl Buf) -> Result<Pose> {
    let position = read_raw_vec3(reader)?;
    let rotation = read_raw_rotation(reader)?;
    let scale = read_raw_vec3(reader)?;
    Ok(Pose::new(position, rotation, scale))
}

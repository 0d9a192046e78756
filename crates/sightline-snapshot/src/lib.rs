//! Sightline Snapshot - Buffered interpolation of remote transforms
//!
//! Remote state arrives in discrete, jittery messages. This crate turns it
//! into smooth motion by playing it back slightly in the past:
//!
//! - **Snapshots**: timestamped transforms, blended with lerp/slerp
//! - **Buffers**: per-entity ordered snapshot queues with a size limit
//! - **Store**: buffers keyed by entity and direction
//! - **Timeline**: per-peer playback clock with drift correction
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   add_snapshot    ┌────────────────┐
//! │  Receiver  │──────────────────▶│ SnapshotBuffer │
//! └────────────┘                   └────────────────┘
//!        │ insert_and_adjust                │ step_interpolation
//!        ▼                                  ▼
//! ┌────────────┐   local_time()    ┌────────────────┐
//! │  Timeline  │──────────────────▶│  Interpolation │──▶ live pose
//! └────────────┘                   └────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use sightline_core::{Pose, Sample, Vec3};
//! use sightline_snapshot::SnapshotBuffer;
//!
//! let mut buffer = SnapshotBuffer::new(32);
//! let live = Pose::IDENTITY;
//!
//! buffer.add_snapshot(1.0, 1.0, Sample::Changed(Vec3::ZERO), Sample::Unchanged, Sample::Unchanged, &live);
//! buffer.add_snapshot(2.0, 2.0, Sample::Changed(Vec3::X * 10.0), Sample::Unchanged, Sample::Unchanged, &live);
//!
//! let step = buffer.step_interpolation(1.5).unwrap();
//! assert_eq!(step.pose().position, Vec3::new(5.0, 0.0, 0.0));
//! ```

mod buffer;
mod error;
mod settings;
mod snapshot;
mod store;
pub mod timeline;

pub use buffer::{BufferStats, Interpolation, SnapshotBuffer};
pub use error::{Error, Result};
pub use settings::{SnapshotSettings, DEFAULT_BUFFER_LIMIT};
pub use snapshot::TransformSnapshot;
pub use store::{BufferKey, Direction, SnapshotStore};
pub use timeline::{Ema, Timeline};

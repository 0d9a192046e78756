//! Sightline Netcode - Transform replication between server and clients
//!
//! This crate ties the other sightline crates together:
//!
//! - **Sending**: sample poses on a fixed interval, quantize them and send
//!   only what changed, delta-coded against the last sent values
//! - **Receiving**: decode against the mirrored baseline and buffer the
//!   result as timestamped snapshots
//! - **Rendering**: play snapshots back on a drift-corrected timeline and
//!   write interpolated poses into the world
//! - **Teleports**: jump without interpolation, reliably
//! - **Events**: scoped subscriptions for statistics and debugging
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────── Server ────────────────────┐
//! │ ┌──────────┐  ┌────────────────┐  ┌──────────┐ │
//! │ │ Interest │─▶│ TransformSender│─▶│Transport │─┼──┐
//! │ └──────────┘  └────────────────┘  └──────────┘ │  │
//! └────────────────────────────────────────────────┘  │ kind, entity,
//!                                                      │ flags, deltas
//! ┌──────────────────── Client ────────────────────┐  │
//! │ ┌──────────┐  ┌─────────────────┐ ┌──────────┐ │  │
//! │ │  Render  │◀─│ SnapshotBuffer  │◀│ Receiver │◀┼──┘
//! │ └──────────┘  └─────────────────┘ └──────────┘ │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sightline_core::{ConnectionId, ConnectionRecord, ManualClock, Pose, TimeSource, Vec3, World};
//! use sightline_interest::InterestConfig;
//! use sightline_netcode::{MemoryNetwork, ReplicationDriver, ReplicationSettings};
//!
//! let clock = ManualClock::new(0.0);
//! let time: Arc<dyn TimeSource> = Arc::new(clock.clone());
//! let network = MemoryNetwork::new();
//!
//! let interest = InterestConfig::from_ron_str("Distance(vis_range: 50.0)")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let mut server = ReplicationDriver::server(
//!     ReplicationSettings::default(),
//!     network.endpoint(ConnectionId::SERVER, time.clone()),
//!     time.clone(),
//!     interest,
//! )
//! .unwrap();
//! let client = network.endpoint(ConnectionId(1), time.clone());
//!
//! let mut world = World::new();
//! let avatar = world.entities.spawn(Pose::at(Vec3::new(1.0, 0.0, 2.0))).id;
//! world.connections.insert(ConnectionRecord::new(ConnectionId(1)).controlling(avatar));
//! server.register(avatar, &world);
//!
//! let report = server.broadcast(&world).unwrap();
//! assert_eq!(report.sent, 1);
//! assert_eq!(client.poll().len(), 1);
//! ```

mod driver;
mod error;
mod events;
pub mod message;
mod receiver;
mod sender;
mod settings;
mod transport;

pub use driver::{BroadcastReport, ReplicationDriver, Side};
pub use error::{Error, Result};
pub use events::{EventHub, ReplicationEvent, ReplicationStats, StatsHandle, Subscription};
pub use message::{Baseline, Message, MessageKind, SyncMessage};
pub use receiver::{ReceiveOutcome, TransformReceiver};
pub use sender::{SendDecision, TransformSender};
pub use settings::ReplicationSettings;
pub use transport::{Channel, Incoming, MemoryNetwork, MemoryTransport, Transport};

//! Crowd Simulation Demo
//!
//! A server walks a crowd of NPCs around a square field and replicates it
//! to three clients over the in-process network. Spatial interest keeps each
//! client's traffic to what is near its avatar. Client 1 drives its own
//! avatar; halfway through, the server teleports client 3.
//!
//! Run with `RUST_LOG=debug` to watch corrections and timeline adjustments.
//! An interest config (RON file) can be passed as the first argument.

use log::{debug, info};
use sightline_core::{
    Authority, ConnectionId, ConnectionRecord, EntityId, EntityRecord, ManualClock, Pose, Quat,
    Registry, RegistryMut, TimeSource, Vec3, World,
};
use sightline_interest::{InterestConfig, VisibilityChange};
use sightline_netcode::{MemoryNetwork, MemoryTransport, ReplicationDriver, ReplicationSettings};
use std::collections::HashSet;
use std::sync::Arc;

const NPC_COUNT: u64 = 120;
const NPC_BASE_ID: u64 = 100;
const FIELD: f32 = 200.0;
const FRAME: f64 = 1.0 / 60.0;
const DURATION: f64 = 10.0;
const CLIENTS: [u64; 3] = [1, 2, 3];
const DEFAULT_INTEREST: &str =
    "SpatialHash(vis_range: 40.0, projection: TopDownXZ, rebuild_interval: 0.25)";

struct Client {
    id: ConnectionId,
    driver: ReplicationDriver<MemoryTransport>,
    world: World,
    /// Entities the server currently replicates to this client
    visible: HashSet<EntityId>,
}

/// NPCs circle their own anchor on a 12x10 grid
fn npc_pose(index: u64, time: f64) -> Pose {
    let anchor_x = (index % 12) as f32 / 12.0 * FIELD - FIELD / 2.0;
    let anchor_z = (index / 12) as f32 / 10.0 * FIELD - FIELD / 2.0;
    let radius = 4.0 + (index % 5) as f32;
    let angle = time as f32 * (0.3 + (index % 7) as f32 * 0.1) + index as f32;

    let mut pose = Pose::at(Vec3::new(
        anchor_x + radius * angle.cos(),
        0.0,
        anchor_z + radius * angle.sin(),
    ));
    pose.rotation = Quat::from_rotation_y(-angle);
    pose
}

fn avatar_pose(id: u64, time: f64) -> Pose {
    match id {
        // Walks across the whole field
        1 => Pose::at(Vec3::new(-90.0 + 18.0 * time as f32, 0.0, 0.0)),
        2 => Pose::IDENTITY,
        _ => Pose::at(Vec3::new(60.0, 0.0, 60.0)),
    }
}

fn pump(
    driver: &mut ReplicationDriver<MemoryTransport>,
    world: &mut World,
) -> sightline_netcode::Result<()> {
    for incoming in driver.transport().poll() {
        driver.receive(&incoming, world)?;
    }
    Ok(())
}

/// Mean distance between what the server has and what a client shows
fn mean_error(server: &World, client: &Client) -> f32 {
    let mut total = 0.0;
    let mut count = 0;
    for &entity in &client.visible {
        if let (Some(truth), Some(shown)) = (server.entity(entity), client.world.entity(entity)) {
            total += truth.pose.position.distance(shown.pose.position);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}

fn apply_visibility(clients: &mut [Client], changes: &[VisibilityChange]) {
    for change in changes {
        for client in clients.iter_mut() {
            if change.added.contains(&client.id) {
                debug!("{} now sees {}", client.id, change.entity);
                client.visible.insert(change.entity);
            }
            if change.removed.contains(&client.id) {
                debug!("{} lost sight of {}", client.id, change.entity);
                client.visible.remove(&change.entity);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== Sightline Crowd Simulation ===\n");

    let interest = match std::env::args().nth(1) {
        Some(path) => InterestConfig::from_ron_file(path)?,
        None => InterestConfig::from_ron_str(DEFAULT_INTEREST)?,
    };
    info!("Interest: {:?}", interest);

    let clock = ManualClock::new(0.0);
    let time: Arc<dyn TimeSource> = Arc::new(clock.clone());
    let network = MemoryNetwork::new();
    let settings = ReplicationSettings::default();

    let mut server = ReplicationDriver::server(
        settings.clone(),
        network.endpoint(ConnectionId::SERVER, Arc::clone(&time)),
        Arc::clone(&time),
        interest.build()?,
    )?;
    let server_stats = server.track_stats();

    // Spawn avatars and the crowd on the server
    let mut server_world = World::new();
    let mut records = Vec::new();
    for &id in &CLIENTS {
        let mut record = EntityRecord::new(EntityId(id), avatar_pose(id, 0.0));
        if id == 1 {
            record = record
                .with_authority(Authority::Client)
                .with_owner(ConnectionId(id));
        }
        records.push(record);
        server_world
            .connections
            .insert(ConnectionRecord::new(ConnectionId(id)).controlling(EntityId(id)));
    }
    for index in 0..NPC_COUNT {
        records.push(EntityRecord::new(
            EntityId(NPC_BASE_ID + index),
            npc_pose(index, 0.0),
        ));
    }
    for record in &records {
        server_world.entities.insert(record.clone());
        server.register(record.id, &server_world);
    }

    // Clients know every entity up front; visibility only decides what
    // the server keeps them updated on
    let mut clients = Vec::new();
    for &id in &CLIENTS {
        let connection = ConnectionId(id);
        let driver = ReplicationDriver::client(
            settings.clone(),
            network.endpoint(connection, Arc::clone(&time)),
            Arc::clone(&time),
            connection,
        )?;
        let mut world = World::new();
        for record in &records {
            world.entities.insert(record.clone());
        }
        clients.push(Client {
            id: connection,
            driver,
            world,
            visible: HashSet::new(),
        });
    }

    println!(
        "Spawned {} NPCs and {} avatars, sending every {:.1}ms\n",
        NPC_COUNT,
        CLIENTS.len(),
        settings.send_interval * 1000.0
    );

    let frames = (DURATION / FRAME).round() as u64;
    let frames_per_second = (1.0 / FRAME).round() as u64;
    let mut teleported = false;

    for frame in 0..=frames {
        let now = frame as f64 * FRAME;
        clock.set(now);

        for index in 0..NPC_COUNT {
            server_world.set_pose(EntityId(NPC_BASE_ID + index), npc_pose(index, now))?;
        }
        if !teleported && now >= DURATION / 2.0 {
            let target = Pose::at(Vec3::new(-60.0, 0.0, -60.0));
            server.teleport(EntityId(3), target, &mut server_world)?;
            println!("  >> teleported avatar 3 to {}", target.position);
            teleported = true;
        }

        // Client 1 moves its own avatar and reports it
        let owner = &mut clients[0];
        owner.world.set_pose(EntityId(1), avatar_pose(1, now))?;
        owner.driver.broadcast(&owner.world)?;

        pump(&mut server, &mut server_world)?;
        server.render(FRAME, &mut server_world)?;
        let report = server.broadcast(&server_world)?;
        apply_visibility(&mut clients, &report.visibility);

        for client in &mut clients {
            pump(&mut client.driver, &mut client.world)?;
            client.driver.render(FRAME, &mut client.world)?;
        }

        if frame > 0 && frame % frames_per_second == 0 {
            let stats = server_stats.snapshot();
            println!(
                "t={:>4.1}s  server sent {:>5} msgs, {:>6} bytes (avg {:.1}, {} full)",
                now,
                stats.messages_sent,
                stats.bytes_sent,
                stats.average_sent_bytes(),
                stats.full_messages_sent
            );
            for client in &clients {
                println!(
                    "          {}: sees {:>3} entities, mean error {:.3}m",
                    client.id,
                    client.visible.len(),
                    mean_error(&server_world, client)
                );
            }
            server_stats.reset();
        }
    }

    println!("\nFinal state:");
    let truth = server_world.entity(EntityId(1)).map(|r| r.pose.position);
    println!("  avatar 1 on client 1: {:?}", avatar_pose(1, DURATION).position);
    println!("  avatar 1 on server:   {:?}", truth);
    for client in &clients[1..] {
        let shown = client.world.entity(EntityId(3)).map(|r| r.pose.position);
        println!("  avatar 3 on {}: {:?}", client.id, shown);
    }

    println!("\n=== Simulation Complete ===");
    Ok(())
}

//! In-process stand-in for the game host: a connection table, a world clock
//! and the host's own periodic time updates.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use flaps_bus::{
    Bus, ConnectionId, Host, TimeUpdate,
    codec::{self, DAY_TICKS},
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// One connected client. It keeps the last update it received and decodes
/// it the way the client side shader would.
#[derive(Debug, Clone, Serialize)]
pub struct SimClient {
    pub name: String,
    pub received: u64,
    pub last_update: Option<TimeUpdate>,
    /// Heading in degrees, as reported by the client.
    pub yaw: f32,
    pub gliding: bool,
}

impl SimClient {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            received: 0,
            last_update: None,
            yaw: 0.0,
            gliding: false,
        }
    }

    /// `(mask, param)` carried by the last update, if it holds a payload.
    pub fn decoded(&self) -> Option<(u8, f32)> {
        let update = self.last_update?;
        let (mask, arg) = codec::unpack(update.time_of_day).ok()?;
        Some((mask, codec::dequantize(arg)))
    }
}

#[derive(Default)]
pub struct SimHost {
    clients: RwLock<HashMap<ConnectionId, SimClient>>,
    world_age: AtomicI64,
}

impl SimHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, name: &str) -> ConnectionId {
        let id = ConnectionId::new_v4();
        self.clients.write().insert(id, SimClient::new(name));
        log::info!("SimHost: {} connected as {}", name, id);
        id
    }

    /// Drops the client and tells the bus to forget it.
    pub fn disconnect(&self, bus: &Bus, id: ConnectionId) -> bool {
        let removed = self.clients.write().remove(&id);
        bus.clear(id);
        match removed {
            Some(client) => {
                log::info!("SimHost: {} ({}) disconnected", client.name, id);
                true
            }
            None => false,
        }
    }

    pub fn client(&self, id: ConnectionId) -> Option<SimClient> {
        self.clients.read().get(&id).cloned()
    }

    pub fn clients(&self) -> Vec<(ConnectionId, SimClient)> {
        self.clients
            .read()
            .iter()
            .map(|(id, client)| (*id, client.clone()))
            .collect()
    }

    /// Updates the client's heading and glide flag. `false` if it is gone.
    pub fn set_flight(&self, id: ConnectionId, yaw: f32, gliding: bool) -> bool {
        let mut clients = self.clients.write();
        let Some(client) = clients.get_mut(&id) else {
            return false;
        };
        if client.gliding != gliding {
            log::debug!(
                "SimHost: {} {} gliding",
                client.name,
                if gliding { "started" } else { "stopped" }
            );
        }
        client.yaw = yaw;
        client.gliding = gliding;
        true
    }

    pub fn current_world_age(&self) -> i64 {
        self.world_age.load(Ordering::SeqCst)
    }

    fn advance_world(&self) -> i64 {
        self.world_age.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The host's own time update for every client, rewritten by the bus
    /// override hook before it goes out.
    pub fn broadcast_native(&self, bus: &Bus) {
        let age = self.current_world_age();
        let ids: Vec<ConnectionId> = self.clients.read().keys().copied().collect();
        for id in ids {
            let mut update = TimeUpdate {
                time_of_day: age.rem_euclid(DAY_TICKS),
                world_age: age,
                continue_cycle: true,
            };
            bus.intercept(id, &mut update);
            if let Err(e) = self.send(id, update) {
                log::debug!("SimHost: native update to {} dropped: {:#}", id, e);
            }
        }
    }
}

impl Host for SimHost {
    fn connections(&self) -> Vec<ConnectionId> {
        self.clients.read().keys().copied().collect()
    }

    fn world_age(&self, conn: ConnectionId) -> Option<i64> {
        self.clients
            .read()
            .contains_key(&conn)
            .then(|| self.current_world_age())
    }

    fn send(&self, conn: ConnectionId, update: TimeUpdate) -> anyhow::Result<()> {
        let mut clients = self.clients.write();
        let client = clients
            .get_mut(&conn)
            .ok_or_else(|| anyhow::anyhow!("connection {} is closed", conn))?;
        client.received += 1;
        client.last_update = Some(update);
        Ok(())
    }
}

/// Runs the host's world clock: one world tick per bus tick and a native
/// time update every `broadcast_every` ticks.
pub(crate) fn start_world_clock(
    host: Arc<SimHost>,
    bus: Arc<Bus>,
    broadcast_every: u64,
    cancel: CancellationToken,
) {
    let period = bus.config().tick_interval();
    let broadcast_every = broadcast_every.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("SimHost: world clock stopped");
                    break;
                },
                _ = interval.tick() => {
                    let age = host.advance_world();
                    if age as u64 % broadcast_every == 0 {
                        host.broadcast_native(&bus);
                    }
                },
            }
        }
    });
}

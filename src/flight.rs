//! Banks the view of gliding clients: the roll effect follows each client's
//! filtered yaw rate, and is switched off again once it stops gliding.

use std::{collections::HashMap, sync::Arc};

use flaps_bus::{Bus, ConnectionId, Effect, codec};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::host::SimHost;

/// Largest roll, in degrees, either way.
pub const MAX_ROLL_DEG: f32 = 70.0;
/// Degrees of roll per degree of yaw change per tick.
pub const ROLL_PER_YAW_DEG: f32 = 12.0;
pub const ROLL_TRANSITION_TICKS: i32 = 5;
/// Low-pass factor for the yaw rate; higher follows the raw rate faster.
pub const YAW_SMOOTH_ALPHA: f32 = 0.10;
/// Filtered yaw rates below this are treated as no turn.
pub const YAW_DEADZONE_DEG: f32 = 0.75;

/// Wraps an angle in degrees to `[-180, 180)`.
pub fn wrap_degrees(deg: f32) -> f32 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Signed roll parameter in `-1..=1` for a filtered yaw rate.
///
/// Turning right (positive rate) rolls the view the other way, hence the
/// negation.
pub fn roll_param(yaw_rate: f32) -> f32 {
    let rate = if yaw_rate.abs() < YAW_DEADZONE_DEG {
        0.0
    } else {
        yaw_rate
    };
    let roll = codec::clamp(rate * ROLL_PER_YAW_DEG, -MAX_ROLL_DEG, MAX_ROLL_DEG);
    -roll / MAX_ROLL_DEG
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct YawTracker {
    last_yaw: f32,
    smoothed_rate: f32,
}

impl YawTracker {
    fn new(yaw: f32) -> Self {
        Self {
            last_yaw: yaw,
            smoothed_rate: 0.0,
        }
    }

    /// Feeds this tick's yaw and returns the filtered rate in degrees per tick.
    fn update(&mut self, yaw: f32) -> f32 {
        let delta = wrap_degrees(yaw - self.last_yaw);
        self.last_yaw = yaw;
        self.smoothed_rate += (delta - self.smoothed_rate) * YAW_SMOOTH_ALPHA;
        self.smoothed_rate
    }
}

#[derive(Default)]
pub struct RollDriver {
    trackers: Mutex<HashMap<ConnectionId, YawTracker>>,
}

impl RollDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// One driver step: a roll commit for every connected client.
    pub fn step(&self, host: &SimHost, bus: &Bus) {
        let clients = host.clients();
        let mut trackers = self.trackers.lock();
        trackers.retain(|id, _| clients.iter().any(|(client_id, _)| client_id == id));

        for (id, client) in clients {
            let yaw = wrap_degrees(client.yaw);
            let rate = trackers
                .entry(id)
                .or_insert_with(|| YawTracker::new(yaw))
                .update(yaw);

            let mut manager = bus.connection(id);
            if client.gliding {
                manager
                    .enable(&Effect::ROLL)
                    .set_param_signed(roll_param(rate));
            } else {
                manager.disable(&Effect::ROLL).set_param_signed(0.0);
            }
            manager.set_transition_ticks(ROLL_TRANSITION_TICKS).commit();

            // disconnected while we were committing
            if host.client(id).is_none() {
                bus.clear(id);
            }
        }
    }
}

/// Runs [`RollDriver::step`] once per bus tick until `cancel` fires.
pub(crate) fn start_roll_driver(
    host: Arc<SimHost>,
    bus: Arc<Bus>,
    driver: Arc<RollDriver>,
    cancel: CancellationToken,
) {
    let period = bus.config().tick_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("RollDriver: stopped");
                    break;
                },
                _ = interval.tick() => {
                    driver.step(&host, &bus);
                },
            }
        }
    });
}

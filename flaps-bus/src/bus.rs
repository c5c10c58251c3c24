use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    carrier::{ConnectionId, Host, TimeUpdate, ValueProvider},
    codec::{CodecError, DAY_TICKS},
    config::{BusConfig, SendMode},
    manager::EffectManager,
    state::ConnectionState,
};

type StateEntry = Arc<Mutex<ConnectionState>>;

/// Drives effect state for every connection of one host.
///
/// One bus per host process: create it at startup, [`start`](Bus::start) it,
/// and [`stop`](Bus::stop) it on shutdown. Dropping the bus stops it.
pub struct Bus {
    shared: Arc<BusShared>,
}

pub(crate) struct BusShared {
    host: Arc<dyn Host>,
    config: BusConfig,
    states: RwLock<HashMap<ConnectionId, StateEntry>>,
    tick_counter: AtomicU64,
    /// Bumped by `stop` under the registry write lock. A tick that started
    /// in an older generation must not track connections again.
    generation: AtomicU64,
    always_send: AtomicBool,
    provider: RwLock<Option<Arc<dyn ValueProvider>>>,
    task: Mutex<Option<TickTask>>,
}

struct TickTask {
    cancel: CancellationToken,
    runtime: Handle,
}

impl Bus {
    pub fn new(host: Arc<dyn Host>, config: BusConfig) -> Self {
        let always_send = config.send_mode == SendMode::Always;
        Self {
            shared: Arc::new(BusShared {
                host,
                config,
                states: RwLock::new(HashMap::new()),
                tick_counter: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                always_send: AtomicBool::new(always_send),
                provider: RwLock::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Starts the repeating tick task on the current tokio runtime.
    pub fn start(&self) -> anyhow::Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| anyhow::anyhow!("bus must be started inside a tokio runtime: {}", e))?;

        let mut task = self.shared.task.lock();
        if task.is_some() {
            log::warn!("Bus already started");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let cancel_clone = cancel.clone();
        runtime.spawn(async move { BusShared::tick_loop(shared, cancel_clone).await });

        *task = Some(TickTask { cancel, runtime });
        log::info!(
            "Bus: started, tick every {:?}, send mode {:?}",
            self.shared.config.tick_interval(),
            self.send_mode()
        );
        Ok(())
    }

    /// Cancels the tick task and pending duplicates, and forgets every connection.
    pub fn stop(&self) {
        if let Some(task) = self.shared.task.lock().take() {
            task.cancel.cancel();
            log::info!("Bus: stopped");
        }
        let mut states = self.shared.states.write();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        states.clear();
    }

    pub fn is_running(&self) -> bool {
        self.shared.task.lock().is_some()
    }

    /// Runs one tick now. The repeating task calls this; hosts that own
    /// their clock may call it instead of [`start`](Bus::start).
    pub fn tick(&self) {
        self.shared.tick();
    }

    pub fn tick_count(&self) -> u64 {
        self.shared.tick_counter.load(Ordering::SeqCst)
    }

    /// Manager for `conn`. Tracks the connection if it is not tracked yet.
    pub fn connection(&self, conn: ConnectionId) -> EffectManager {
        self.shared.state_for(conn);
        EffectManager::new(Arc::clone(&self.shared), conn)
    }

    /// Forgets `conn`. Also the disconnect notification.
    pub fn clear(&self, conn: ConnectionId) {
        if self.shared.states.write().remove(&conn).is_some() {
            log::debug!("Bus: cleared connection {}", conn);
        }
    }

    pub fn snapshot(&self, conn: ConnectionId) -> Option<ConnectionState> {
        let entry = self.shared.states.read().get(&conn).cloned();
        entry.map(|state| state.lock().clone())
    }

    pub fn tracked(&self) -> Vec<ConnectionId> {
        self.shared.states.read().keys().copied().collect()
    }

    pub fn set_value_provider<P>(&self, provider: P)
    where
        P: ValueProvider + 'static,
    {
        *self.shared.provider.write() = Some(Arc::new(provider));
    }

    pub fn clear_value_provider(&self) {
        *self.shared.provider.write() = None;
    }

    pub fn set_send_mode(&self, mode: SendMode) {
        self.shared
            .always_send
            .store(mode == SendMode::Always, Ordering::Relaxed);
    }

    pub fn send_mode(&self) -> SendMode {
        if self.shared.always_send.load(Ordering::Relaxed) {
            SendMode::Always
        } else {
            SendMode::OnChange
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Override hook for the host's own time update to `conn`, called right
    /// before it is written out.
    ///
    /// Untracked connections are left alone and `false` is returned. For a
    /// tracked connection the payload is injected, the continue-cycle flag
    /// cleared and duplicates of the rewritten update are scheduled.
    pub fn intercept(&self, conn: ConnectionId, update: &mut TimeUpdate) -> bool {
        let shared = &self.shared;
        let Some(entry) = shared.states.read().get(&conn).cloned() else {
            return false;
        };

        let payload = {
            let mut state = entry.lock();
            match state.last_sent() {
                Some(payload) => payload,
                None => {
                    let custom = shared.custom_value(conn, &state);
                    match shared.resolve_payload(conn, &state, custom) {
                        Ok(payload) => {
                            state.set_last_sent(payload);
                            payload
                        }
                        Err(e) => {
                            log::warn!("Bus: not intercepting update to {}: {}", conn, e);
                            return false;
                        }
                    }
                }
            }
        };

        update.time_of_day = payload;
        update.world_age = shared.world_age(conn).unwrap_or(update.world_age);
        update.continue_cycle = false;

        shared.schedule_duplicates(conn, *update);
        true
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.stop();
    }
}

impl BusShared {
    async fn tick_loop(shared: Arc<BusShared>, cancel: CancellationToken) {
        let period = shared.config.tick_interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                },
                _ = interval.tick() => {
                    shared.tick();
                },
            }
        }
        log::debug!("Bus: tick loop finished");
    }

    pub(crate) fn state_for(&self, conn: ConnectionId) -> StateEntry {
        if let Some(state) = self.states.read().get(&conn) {
            return Arc::clone(state);
        }

        let mut states = self.states.write();
        let state = states.entry(conn).or_insert_with(|| {
            log::debug!("Bus: tracking connection {}", conn);
            Arc::new(Mutex::new(ConnectionState::new()))
        });
        Arc::clone(state)
    }

    /// Like [`state_for`](Self::state_for), but `None` once the bus was
    /// stopped after `generation` was read.
    fn state_in(&self, conn: ConnectionId, generation: u64) -> Option<StateEntry> {
        {
            let states = self.states.read();
            if self.generation.load(Ordering::SeqCst) != generation {
                return None;
            }
            if let Some(state) = states.get(&conn) {
                return Some(Arc::clone(state));
            }
        }

        let mut states = self.states.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        let state = states.entry(conn).or_insert_with(|| {
            log::debug!("Bus: tracking connection {}", conn);
            Arc::new(Mutex::new(ConnectionState::new()))
        });
        Some(Arc::clone(state))
    }

    pub(crate) fn current_tick(&self) -> u64 {
        self.tick_counter.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let now = self.tick_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let always = self.always_send.load(Ordering::Relaxed);

        for conn in self.host.connections() {
            let Some(entry) = self.state_in(conn, generation) else {
                log::debug!("Bus: stopped during tick {}", now);
                return;
            };
            let payload = {
                let mut state = entry.lock();
                let custom = self.custom_value(conn, &state);
                state.advance(now);

                let payload = match self.resolve_payload(conn, &state, custom) {
                    Ok(payload) => {
                        state.set_rejected(false);
                        payload
                    }
                    Err(e) => {
                        if state.set_rejected(true) {
                            log::warn!(
                                "Bus: skipping {} until its effects change: {}",
                                conn,
                                e
                            );
                        } else {
                            log::trace!("Bus: skipping {} this tick: {}", conn, e);
                        }
                        continue;
                    }
                };
                if !always && state.last_sent() == Some(payload) {
                    continue;
                }
                state.set_last_sent(payload);
                payload
            };

            let update = TimeUpdate::new(payload, self.world_age(conn).unwrap_or(0));
            log::trace!("Bus: tick {} -> {} {:?}", now, conn, update);
            if let Err(e) = self.host.send(conn, update) {
                log::error!("Bus: send time update to {} failed: {:#}", conn, e);
            }
        }
    }

    fn custom_value(&self, conn: ConnectionId, state: &ConnectionState) -> Option<i64> {
        let provider = self.provider.read().clone();
        provider.and_then(|p| p.provide(conn, state))
    }

    fn resolve_payload(
        &self,
        conn: ConnectionId,
        state: &ConnectionState,
        custom: Option<i64>,
    ) -> Result<i64, CodecError> {
        match custom {
            Some(value) if (0..DAY_TICKS).contains(&value) => Ok(value),
            Some(value) => {
                log::warn!(
                    "Bus: custom value {} for {} outside 0..{}, using codec",
                    value,
                    conn,
                    DAY_TICKS
                );
                state.payload()
            }
            None => state.payload(),
        }
    }

    fn world_age(&self, conn: ConnectionId) -> Option<i64> {
        if self.config.forward_world_age {
            self.host.world_age(conn)
        } else {
            Some(0)
        }
    }

    fn schedule_duplicates(self: &Arc<Self>, conn: ConnectionId, update: TimeUpdate) {
        let count = self.config.duplicate_count;
        if count == 0 {
            return;
        }

        let Some((runtime, cancel)) = self
            .task
            .lock()
            .as_ref()
            .map(|task| (task.runtime.clone(), task.cancel.clone()))
        else {
            log::debug!("Bus: not running, no duplicate for {}", conn);
            return;
        };

        let weak: Weak<BusShared> = Arc::downgrade(self);
        let delay = self.config.duplicate_delay();
        runtime.spawn(async move {
            for _ in 0..count {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return;
                    },
                    _ = tokio::time::sleep(delay) => {},
                }

                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if !shared.states.read().contains_key(&conn) {
                    log::debug!("Bus: {} no longer tracked, duplicate dropped", conn);
                    return;
                }
                if let Err(e) = shared.host.send(conn, update) {
                    log::warn!("Bus: duplicate time update to {} failed: {:#}", conn, e);
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod bus_test;

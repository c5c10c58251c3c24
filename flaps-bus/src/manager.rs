use std::sync::Arc;

use crate::{
    bus::BusShared,
    carrier::ConnectionId,
    codec::CodecError,
    effect::Effect,
    staged::StagedChange,
};

/// Builder style handle over one connection's effects.
///
/// Edits are staged and only become visible on [`commit`](Self::commit).
/// After a commit the handle is empty again and can be reused. Keep it on
/// one thread; it is cheap to acquire another one from the bus.
pub struct EffectManager {
    bus: Arc<BusShared>,
    conn: ConnectionId,
    staged: StagedChange,
}

impl EffectManager {
    pub(crate) fn new(bus: Arc<BusShared>, conn: ConnectionId) -> Self {
        Self {
            bus,
            conn,
            staged: StagedChange::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn
    }

    pub fn staged(&self) -> &StagedChange {
        &self.staged
    }

    pub fn enable(&mut self, effect: &Effect) -> &mut Self {
        self.staged.enable(effect);
        self
    }

    pub fn disable(&mut self, effect: &Effect) -> &mut Self {
        self.staged.disable(effect);
        self
    }

    pub fn set_mask(&mut self, mask: i32) -> Result<&mut Self, CodecError> {
        self.staged.set_mask(mask)?;
        Ok(self)
    }

    pub fn set_param01(&mut self, value: f32) -> &mut Self {
        self.staged.set_param01(value);
        self
    }

    pub fn set_param_signed(&mut self, value: f32) -> &mut Self {
        self.staged.set_param_signed(value);
        self
    }

    pub fn set_transition_ticks(&mut self, ticks: i32) -> &mut Self {
        self.staged.set_transition_ticks(ticks);
        self
    }

    /// Applies the staged edits under the connection's lock and resets the handle.
    pub fn commit(&mut self) {
        let change = self.staged.take();
        let entry = self.bus.state_for(self.conn);
        let mut state = entry.lock();
        let now = self.bus.current_tick();
        change.apply_to(&mut state, now);
        log::trace!("EffectManager: committed {:?} to {}", change, self.conn);
    }
}

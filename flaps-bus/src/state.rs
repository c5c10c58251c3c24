use crate::{
    codec::{self, CodecError},
    easing::smoothstep,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transitioning,
}

/// Effect state of one connection.
///
/// `param` is always within `0..=1`. While transitioning it is eased from
/// `start_param` towards `target_param` over `duration_ticks` bus ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    mask: u8,
    param: f32,
    start_param: f32,
    target_param: f32,
    start_tick: u64,
    duration_ticks: u32,
    transitioning: bool,
    last_sent: Option<i64>,
    rejected: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            mask: 0,
            param: 0.5,
            start_param: 0.5,
            target_param: 0.5,
            start_tick: 0,
            duration_ticks: 0,
            transitioning: false,
            last_sent: None,
            rejected: false,
        }
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn param(&self) -> f32 {
        self.param
    }

    pub fn start_param(&self) -> f32 {
        self.start_param
    }

    pub fn target_param(&self) -> f32 {
        self.target_param
    }

    pub fn start_tick(&self) -> u64 {
        self.start_tick
    }

    pub fn duration_ticks(&self) -> u32 {
        self.duration_ticks
    }

    pub fn phase(&self) -> Phase {
        if self.transitioning {
            Phase::Transitioning
        } else {
            Phase::Idle
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    /// Payload most recently sent or injected, `None` before the first one.
    pub fn last_sent(&self) -> Option<i64> {
        self.last_sent
    }

    pub(crate) fn set_last_sent(&mut self, payload: i64) {
        self.last_sent = Some(payload);
    }

    /// Whether the last tick could not encode this state.
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Records the outcome of the last encode. Returns `true` when the state
    /// just became rejected.
    pub(crate) fn set_rejected(&mut self, rejected: bool) -> bool {
        let newly = rejected && !self.rejected;
        self.rejected = rejected;
        newly
    }

    pub(crate) fn apply_mask(&mut self, keep: u8, force: u8) {
        self.mask = (self.mask & keep) | force;
    }

    /// Sets the parameter at tick `now`.
    ///
    /// With `duration_ticks == 0` the value is applied at once. Otherwise a
    /// transition starts from the current, possibly mid-transition, value.
    pub fn set_param(&mut self, value: f32, duration_ticks: u32, now: u64) {
        let value = codec::clamp01(value);
        if duration_ticks == 0 {
            self.param = value;
            self.transitioning = false;
            self.duration_ticks = 0;
        } else {
            self.start_param = self.param;
            self.target_param = value;
            self.start_tick = now;
            self.duration_ticks = duration_ticks;
            self.transitioning = true;
        }
    }

    /// Moves an active transition to tick `now`. Runs once per tick before packing.
    pub fn advance(&mut self, now: u64) {
        if !self.transitioning {
            return;
        }

        let elapsed = now.saturating_sub(self.start_tick);
        if elapsed == 0 {
            self.param = self.start_param;
            return;
        }

        if elapsed >= self.duration_ticks as u64 {
            self.param = self.target_param;
            self.transitioning = false;
            return;
        }

        let t = elapsed as f32 / self.duration_ticks as f32;
        let eased = smoothstep(t);
        self.param = codec::clamp01(
            self.start_param + (self.target_param - self.start_param) * eased,
        );
    }

    /// Codec payload for the current mask and parameter.
    pub fn payload(&self) -> Result<i64, CodecError> {
        codec::pack(self.mask, codec::quantize01(self.param))
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

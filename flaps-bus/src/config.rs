use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Send every tick, even when the payload did not change.
    #[default]
    Always,
    /// Send only when the payload differs from the last one sent.
    OnChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Length of one bus tick. 50ms matches a 20 Hz host.
    pub tick_interval_ms: u64,
    pub send_mode: SendMode,
    /// Delay, in ticks, before an intercepted native update is sent again.
    pub duplicate_delay_ticks: u32,
    /// How many duplicates follow an intercepted native update. 0 disables them.
    pub duplicate_count: u32,
    /// Send the host's world age as the secondary field instead of 0.
    pub forward_world_age: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            send_mode: SendMode::Always,
            duplicate_delay_ticks: 5,
            duplicate_count: 1,
            forward_world_age: true,
        }
    }
}

impl BusConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn duplicate_delay(&self) -> Duration {
        self.tick_interval() * self.duplicate_delay_ticks
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }
}

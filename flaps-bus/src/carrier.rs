//! The carrier message and the host collaborators the bus talks to.

use serde::{Deserialize, Serialize};

use crate::state::ConnectionState;

pub type ConnectionId = uuid::Uuid;

/// World clock update, the message the signal rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUpdate {
    /// Primary field: the packed payload once the bus owns the message.
    pub time_of_day: i64,
    /// Secondary field. The client falls back to it for its own cycle, so
    /// it is kept valid to avoid flicker.
    pub world_age: i64,
    /// Continue-cycle flag, always `false` for messages the bus controls.
    pub continue_cycle: bool,
}

impl TimeUpdate {
    pub fn new(time_of_day: i64, world_age: i64) -> Self {
        Self {
            time_of_day,
            world_age,
            continue_cycle: false,
        }
    }
}

/// Host platform seen from the bus.
pub trait Host: Send + Sync + 'static {
    /// All currently live connections.
    fn connections(&self) -> Vec<ConnectionId>;

    /// World age for the world `conn` is in, `None` if unknown.
    fn world_age(&self, conn: ConnectionId) -> Option<i64>;

    /// Queues `update` for `conn`. Must not block on network I/O.
    fn send(&self, conn: ConnectionId, update: TimeUpdate) -> anyhow::Result<()>;
}

/// Supplies a fully custom payload per connection and tick, bypassing the codec.
///
/// Called with the connection's state locked; implementations must not call
/// back into the bus.
pub trait ValueProvider: Send + Sync {
    fn provide(&self, conn: ConnectionId, state: &ConnectionState) -> Option<i64>;
}

impl<F> ValueProvider for F
where
    F: Fn(ConnectionId, &ConnectionState) -> Option<i64> + Send + Sync,
{
    fn provide(&self, conn: ConnectionId, state: &ConnectionState) -> Option<i64> {
        self(conn, state)
    }
}

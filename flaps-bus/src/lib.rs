//! Per-connection effect signalling over the host's world clock updates.
//!
//! A [`Bus`] packs each connection's effect mask and eased parameter into the
//! time-of-day field of [`TimeUpdate`] every tick, and rewrites the host's own
//! time updates through [`Bus::intercept`] so they carry the same payload.

pub mod bus;
pub mod carrier;
pub mod codec;
pub mod config;
pub mod easing;
pub mod effect;
pub mod manager;
pub mod staged;
pub mod state;

pub use bus::Bus;
pub use carrier::{ConnectionId, Host, TimeUpdate, ValueProvider};
pub use codec::CodecError;
pub use config::{BusConfig, SendMode};
pub use effect::Effect;
pub use manager::EffectManager;
pub use staged::StagedChange;
pub use state::{ConnectionState, Phase};

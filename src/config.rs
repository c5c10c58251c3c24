use std::sync::LazyLock;

use flaps_bus::BusConfig;
use serde::{Deserialize, Serialize};

/// Path of the JSON config file; defaults apply when unset.
pub const CONFIG_ENV: &str = "FLAPS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Cadence of the host's own time updates, in ticks.
    pub native_broadcast_interval_ticks: u64,
    /// Drive the roll effect from each gliding client's yaw rate.
    pub roll_driver: bool,
    pub bus: BusConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            native_broadcast_interval_ticks: 20,
            roll_driver: true,
            bus: BusConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).map_err(|e| anyhow::anyhow!("invalid config: {}", e))
    }

    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("read config {}: {}", path, e))?;
                Self::from_json(&text)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}

pub fn config() -> &'static ServerConfig {
    static CONFIG: LazyLock<ServerConfig> = LazyLock::new(|| {
        ServerConfig::load().unwrap_or_else(|e| {
            eprintln!("Error loading config: {:#}", e);
            std::process::exit(1);
        })
    });
    &CONFIG
}

#[cfg(test)]
mod tests {
    use flaps_bus::SendMode;

    use super::*;

    #[test]
    fn test_from_json_nested_bus() {
        let config = ServerConfig::from_json(
            r#"{"listen":"127.0.0.1:9000","bus":{"send_mode":"on_change","tick_interval_ms":100}}"#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.native_broadcast_interval_ticks, 20);
        assert!(config.roll_driver);
        assert_eq!(config.bus.send_mode, SendMode::OnChange);
        assert_eq!(config.bus.tick_interval_ms, 100);
        assert_eq!(config.bus.duplicate_delay_ticks, 5);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ServerConfig::from_json("{").is_err());
        assert!(ServerConfig::from_json(r#"{"bus":{"send_mode":"sometimes"}}"#).is_err());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(ServerConfig::from_json("{}").unwrap(), ServerConfig::default());
    }
}

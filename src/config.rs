use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::door::DoorId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GarageConfig {
    pub controller: ControllerConfig,
    pub hardware: HardwareConfig,
    pub server: ServerConfig,
    pub system: SystemConfig,
    #[serde(default = "default_doors")]
    pub doors: Vec<DoorConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControllerConfig {
    /// Sensor polling interval in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Consecutive identical samples required before a raw change is accepted
    #[serde(default = "default_debounce_samples")]
    pub debounce_samples: u32,

    /// Minimum time between accepted commands on the same door channel
    #[serde(default = "default_command_cooldown_ms")]
    pub command_cooldown_ms: u64,

    /// How long a relay stays energized for one pulse
    #[serde(default = "default_pulse_duration_ms")]
    pub pulse_duration_ms: u64,
}

impl ControllerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn command_cooldown(&self) -> Duration {
        Duration::from_millis(self.command_cooldown_ms)
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// In-process garage model, no GPIO access
    Simulated,
    /// Linux sysfs GPIO interface
    Sysfs,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HardwareConfig {
    /// Which hardware backend drives sensors and relays
    #[serde(default = "default_backend")]
    pub backend: HardwareBackend,

    /// Root of the sysfs GPIO tree
    #[serde(default = "default_gpio_root")]
    pub gpio_root: String,

    /// Inputs use pull-ups, so an asserted switch reads low
    #[serde(default = "default_inputs_active_low")]
    pub inputs_active_low: bool,

    /// Time a simulated door takes to travel between limits
    #[serde(default = "default_simulated_travel_ms")]
    pub simulated_travel_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port for the HTTP surface (/watch, /state, /health)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port for observer WebSocket sessions
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Outbound messages buffered per observer before it is evicted
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// Pin assignment for one door unit
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DoorConfig {
    pub id: DoorId,
    pub open_pin: u32,
    pub close_pin: u32,
    pub lock_pin: u32,
    pub command_pin: u32,
    pub light_pin: u32,
}

impl GarageConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("garagectl.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "controller.sample_interval_ms",
                default_sample_interval_ms(),
            )?
            .set_default("controller.debounce_samples", default_debounce_samples())?
            .set_default(
                "controller.command_cooldown_ms",
                default_command_cooldown_ms(),
            )?
            .set_default("controller.pulse_duration_ms", default_pulse_duration_ms())?
            .set_default("hardware.backend", "simulated")?
            .set_default("hardware.gpio_root", default_gpio_root())?
            .set_default("hardware.inputs_active_low", default_inputs_active_low())?
            .set_default(
                "hardware.simulated_travel_ms",
                default_simulated_travel_ms(),
            )?
            .set_default("server.ip", default_server_ip())?
            .set_default("server.http_port", default_http_port())?
            .set_default("server.ws_port", default_ws_port())?
            .set_default(
                "server.session_queue_capacity",
                default_session_queue_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("GARAGECTL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: GarageConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.sample_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sample interval must be greater than 0".to_string(),
            ));
        }

        if self.controller.debounce_samples == 0 {
            return Err(ConfigError::Message(
                "Debounce samples must be greater than 0".to_string(),
            ));
        }

        if self.controller.pulse_duration_ms == 0 {
            return Err(ConfigError::Message(
                "Pulse duration must be greater than 0".to_string(),
            ));
        }

        // A second pulse must never start while the first is still energized
        if self.controller.command_cooldown_ms < self.controller.pulse_duration_ms {
            return Err(ConfigError::Message(format!(
                "Command cooldown ({} ms) must not be shorter than the pulse duration ({} ms)",
                self.controller.command_cooldown_ms, self.controller.pulse_duration_ms
            )));
        }

        if self.doors.is_empty() {
            return Err(ConfigError::Message(
                "At least one door must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for door in &self.doors {
            if door.id == 0 {
                return Err(ConfigError::Message(
                    "Door ids start at 1".to_string(),
                ));
            }
            if !seen.insert(door.id) {
                return Err(ConfigError::Message(format!(
                    "Duplicate door id {}",
                    door.id
                )));
            }
        }

        let mut pins = HashSet::new();
        for door in &self.doors {
            for pin in [
                door.open_pin,
                door.close_pin,
                door.lock_pin,
                door.command_pin,
                door.light_pin,
            ] {
                if !pins.insert(pin) {
                    return Err(ConfigError::Message(format!(
                        "GPIO {} is assigned more than once (door {})",
                        pin, door.id
                    )));
                }
            }
        }

        if self.server.http_port == 0 || self.server.ws_port == 0 {
            return Err(ConfigError::Message(
                "Server ports must be greater than 0".to_string(),
            ));
        }

        if self.server.http_port == self.server.ws_port {
            return Err(ConfigError::Message(
                "HTTP and WebSocket ports must differ".to_string(),
            ));
        }

        if self.server.session_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Session queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up the pin map for a door
    pub fn door(&self, id: DoorId) -> Option<&DoorConfig> {
        self.doors.iter().find(|door| door.id == id)
    }
}

impl Default for GarageConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig {
                sample_interval_ms: default_sample_interval_ms(),
                debounce_samples: default_debounce_samples(),
                command_cooldown_ms: default_command_cooldown_ms(),
                pulse_duration_ms: default_pulse_duration_ms(),
            },
            hardware: HardwareConfig {
                backend: default_backend(),
                gpio_root: default_gpio_root(),
                inputs_active_low: default_inputs_active_low(),
                simulated_travel_ms: default_simulated_travel_ms(),
            },
            server: ServerConfig {
                ip: default_server_ip(),
                http_port: default_http_port(),
                ws_port: default_ws_port(),
                session_queue_capacity: default_session_queue_capacity(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
            doors: default_doors(),
        }
    }
}

// Default value functions
fn default_sample_interval_ms() -> u64 {
    50
}
fn default_debounce_samples() -> u32 {
    3
}
fn default_command_cooldown_ms() -> u64 {
    2000
}
fn default_pulse_duration_ms() -> u64 {
    1000
}

fn default_backend() -> HardwareBackend {
    HardwareBackend::Simulated
}
fn default_gpio_root() -> String {
    "/sys/class/gpio".to_string()
}
fn default_inputs_active_low() -> bool {
    true
}
fn default_simulated_travel_ms() -> u64 {
    3000
}

fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_ws_port() -> u16 {
    8081
}
fn default_session_queue_capacity() -> usize {
    32
}

fn default_event_bus_capacity() -> usize {
    100
}

// Two doors wired the way the reference board is
fn default_doors() -> Vec<DoorConfig> {
    vec![
        DoorConfig {
            id: 1,
            open_pin: 25,
            close_pin: 26,
            lock_pin: 27,
            command_pin: 18,
            light_pin: 19,
        },
        DoorConfig {
            id: 2,
            open_pin: 5,
            close_pin: 17,
            lock_pin: 16,
            command_pin: 33,
            light_pin: 32,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GarageConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.doors.len(), 2);
        assert_eq!(config.controller.pulse_duration(), Duration::from_secs(1));
        assert_eq!(config.hardware.backend, HardwareBackend::Simulated);
    }

    #[test]
    fn test_config_validation() {
        let mut config = GarageConfig::default();

        // Cooldown shorter than the pulse would let relays chatter
        config.controller.command_cooldown_ms = 500;
        assert!(config.validate().is_err());

        config.controller.command_cooldown_ms = 1000;
        assert!(config.validate().is_ok());

        config.controller.debounce_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_door_ids_rejected() {
        let mut config = GarageConfig::default();
        config.doors[1].id = 1;

        assert!(config.validate().is_err());

        config.doors.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_gpio_rejected() {
        let mut config = GarageConfig::default();
        config.doors[1].light_pin = config.doors[0].command_pin;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_ports_rejected() {
        let mut config = GarageConfig::default();
        config.server.ws_port = config.server.http_port;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[controller]
debounce_samples = 5
pulse_duration_ms = 750

[hardware]
backend = "sysfs"
gpio_root = "/tmp/gpio"

[server]
ws_port = 9001

[[doors]]
id = 1
open_pin = 1
close_pin = 2
lock_pin = 3
command_pin = 4
light_pin = 5
"#
        )
        .unwrap();

        let config = GarageConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.controller.debounce_samples, 5);
        assert_eq!(config.controller.pulse_duration_ms, 750);
        assert_eq!(config.controller.sample_interval_ms, 50);
        assert_eq!(config.hardware.backend, HardwareBackend::Sysfs);
        assert_eq!(config.hardware.gpio_root, "/tmp/gpio");
        assert_eq!(config.server.ws_port, 9001);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.doors.len(), 1);
        assert_eq!(config.door(1).map(|d| d.light_pin), Some(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GarageConfig::load_from_file("/nonexistent/garagectl.toml").unwrap();

        assert_eq!(config.doors, default_doors());
        assert_eq!(config.server.http_port, 8080);
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string(&GarageConfig::default()).unwrap();

        assert!(rendered.contains("[controller]"));
        assert!(rendered.contains("[[doors]]"));
        assert!(rendered.contains("backend = \"simulated\""));
    }
}

//! Configuration structs with sensible defaults and RON persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name inside the config directory.
pub const CONFIG_FILE: &str = "config.ron";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Server connection settings.
    pub network: NetworkConfig,
    /// Input settings.
    pub input: InputConfig,
    /// Latency probing settings.
    pub latency: LatencyConfig,
    /// Identity announced when joining.
    pub player: PlayerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Explicit socket URL. When set, origin and dev port are ignored.
    pub server_url: Option<String>,
    /// Origin of the page the client was served from.
    pub page_origin: String,
    /// Development server port replacing the origin's port.
    pub dev_port: Option<u16>,
    /// How long to wait for a socket to open, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
}

/// Input configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Keybinding overrides (action name -> key name).
    pub keybindings: BTreeMap<String, String>,
    /// Minimum spacing between input transmissions, in milliseconds.
    pub send_interval_ms: u64,
    /// Turret rotation that counts as a change, in radians.
    pub angle_threshold_rad: f32,
    /// Input surface width in pixels.
    pub surface_width: f32,
    /// Input surface height in pixels.
    pub surface_height: f32,
}

/// Latency probing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatencyConfig {
    /// Interval between probes while connected, in milliseconds.
    pub probe_interval_ms: u64,
    /// Number of RTT samples kept for statistics.
    pub window_size: usize,
}

/// Player identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub display_name: String,
    pub client_version: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files. No file logging when unset.
    pub json_log_dir: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            page_origin: "http://localhost:8080".to_string(),
            dev_port: None,
            connect_timeout_ms: 5000,
            reconnect_base_delay_ms: 1000,
            max_reconnect_attempts: 5,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keybindings: BTreeMap::new(),
            send_interval_ms: 50,
            angle_threshold_rad: 0.05,
            surface_width: 1280.0,
            surface_height: 720.0,
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 2000,
            window_size: 100,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            display_name: "WebClient".to_string(),
            client_version: "1.0.0".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_log_dir: None,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for the client, e.g. `~/.config/tread`.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("tread"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Resolve the config directory (explicit path first) and load from it.
    pub fn load_from(explicit_dir: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let dir = match explicit_dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_dir()?,
        };
        let config = Self::load_or_create(&dir)?;
        Ok((config, dir))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

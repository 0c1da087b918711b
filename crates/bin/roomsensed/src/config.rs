//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `roomsense.toml` in the working directory unless a path is
//! given as first argument or through `ROOMSENSE_CONFIG`. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use roomsense_adapter_mqtt::MqttConfig;
use roomsense_domain::entity::StateValue;
use roomsense_domain::error::RoomSenseError;
use roomsense_domain::id::EntityId;
use roomsense_domain::room::{self, RoomConfig};

/// File looked up when no path is given.
pub const DEFAULT_PATH: &str = "roomsense.toml";

/// Targets match by prefix, so `roomsense` covers every library crate.
pub const DEFAULT_LOG_FILTER: &str = "roomsensed=info,roomsense=info";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// MQTT bridge settings.
    pub mqtt: MqttConfig,
    /// One entry per derived occupancy sensor.
    pub rooms: Vec<RoomSettings>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Raw settings of one room, as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub name: String,
    /// Cool-down in seconds.
    pub timeout: u64,
    /// Trigger entities.
    pub entities_toggle: Vec<String>,
    /// Keep-alive entities.
    pub entities_keep: Vec<String>,
    pub active_states: Vec<StateValue>,
}

/// Pick the configuration file: explicit argument, then `ROOMSENSE_CONFIG`,
/// then [`DEFAULT_PATH`].
#[must_use]
pub fn resolve_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var("ROOMSENSE_CONFIG").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from)
}

impl Config {
    /// Load configuration from `path` (if present), apply
    /// environment-variable overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the result fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROOMSENSE_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("ROOMSENSE_MQTT_PORT") {
            if let Ok(port) = val.parse() {
                self.mqtt.broker_port = port;
            }
        }
        if let Ok(val) = std::env::var("ROOMSENSE_MQTT_BASE_TOPIC") {
            self.mqtt.base_topic = val;
        }
        if let Ok(val) = std::env::var("ROOMSENSE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.enabled && self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "MQTT broker port must be non-zero".to_string(),
            ));
        }
        self.room_configs()?;
        Ok(())
    }

    /// Build the validated room configurations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Room`] for the first room that fails
    /// validation, or [`ConfigError::Validation`] when two rooms derive the
    /// same entity id.
    pub fn room_configs(&self) -> Result<Vec<RoomConfig>, ConfigError> {
        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(self.rooms.len());
        for settings in &self.rooms {
            let config = settings.to_room_config().map_err(|source| ConfigError::Room {
                name: settings.name.clone(),
                source,
            })?;
            if !seen.insert(config.entity_id().clone()) {
                return Err(ConfigError::Validation(format!(
                    "rooms derive the same entity id {}",
                    config.entity_id()
                )));
            }
            configs.push(config);
        }
        Ok(configs)
    }
}

impl RoomSettings {
    /// Validate and convert into a [`RoomConfig`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed entity ids, an empty name,
    /// a zero timeout or a room without trigger entities.
    pub fn to_room_config(&self) -> Result<RoomConfig, RoomSenseError> {
        let parse = |ids: &[String]| -> Result<BTreeSet<EntityId>, RoomSenseError> {
            ids.iter()
                .map(|raw| raw.parse::<EntityId>().map_err(RoomSenseError::from))
                .collect()
        };

        RoomConfig::builder()
            .name(self.name.clone())
            .timeout(Duration::from_secs(self.timeout))
            .trigger_entities(parse(&self.entities_toggle)?)
            .keep_entities(parse(&self.entities_keep)?)
            .active_values(self.active_states.iter().cloned())
            .build()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: room::DEFAULT_NAME.to_string(),
            timeout: room::DEFAULT_TIMEOUT.as_secs(),
            entities_toggle: Vec::new(),
            entities_keep: Vec::new(),
            active_states: room::default_active_values(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A room entry is invalid.
    #[error("invalid room {name:?}")]
    Room {
        name: String,
        #[source]
        source: RoomSenseError,
    },
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// The authorization requirement of a room created at startup.
///
/// A connection may only join a room with an auth requirement if its
/// `room_match_key`/`room_match_value` pair equals `auth_key`/`auth_value`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomAuth {
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default)]
    pub auth_value: Option<String>,
}

/// Settings shared by every transport.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    /// The room every new connection is placed in.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// How many actions a single connection may have in flight at once.
    #[serde(default = "default_simultaneous_actions")]
    pub simultaneous_actions: usize,
    /// Sent to stream clients (e.g. TCP) right after they connect.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// Rooms created at boot, with their optional auth requirement.
    #[serde(default = "default_starting_rooms")]
    pub starting_rooms: IndexMap<String, RoomAuth>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
            simultaneous_actions: default_simultaneous_actions(),
            welcome_message: default_welcome_message(),
            starting_rooms: default_starting_rooms(),
        }
    }
}

fn default_room() -> String {
    "defaultRoom".to_string()
}
fn default_simultaneous_actions() -> usize {
    5
}
fn default_welcome_message() -> String {
    "Hello! Welcome to the roomhub server".to_string()
}
fn default_starting_rooms() -> IndexMap<String, RoomAuth> {
    let mut rooms = IndexMap::new();
    rooms.insert(default_room(), RoomAuth::default());
    rooms
}

/// Settings for the `web` transport class.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WebConfig {
    /// How long a disconnected web client keeps its connection (and room
    /// membership) around. Unset means web clients are one-shot.
    #[serde(default, with = "humantime_serde")]
    pub client_message_ttl: Option<Duration>,
}

impl WebConfig {
    /// The effective grace period. A zero TTL is the same as no TTL.
    pub fn ttl(&self) -> Option<Duration> {
        self.client_message_ttl.filter(|ttl| !ttl.is_zero())
    }
}

/// Settings for the background task that purges expired web connections.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: default_reaper_interval(),
        }
    }
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(1)
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8879
}

/// The top-level server configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            general: GeneralConfig::default(),
            web: WebConfig::default(),
            reaper: ReaperConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.general.default_room.trim().is_empty() {
            return Err(anyhow!("general.default_room cannot be empty"));
        }
        if self.general.simultaneous_actions == 0 {
            return Err(anyhow!("general.simultaneous_actions cannot be 0"));
        }
        if self.reaper.interval.is_zero() {
            return Err(anyhow!("reaper.interval cannot be 0"));
        }

        if !self
            .general
            .starting_rooms
            .contains_key(&self.general.default_room)
        {
            warn!(
                "default room '{}' is not in general.starting_rooms; new connections will not be able to join it.",
                self.general.default_room
            );
        }

        for (name, auth) in &self.general.starting_rooms {
            if auth.auth_key.is_some() != auth.auth_value.is_some() {
                return Err(anyhow!(
                    "room '{}' must set both auth_key and auth_value, or neither",
                    name
                ));
            }
        }

        if self.web.client_message_ttl.is_some_and(|ttl| ttl.is_zero()) {
            warn!("web.client_message_ttl is 0; web clients will be treated as one-shot.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}

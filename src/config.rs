//! Agent settings for the light sensor agent
//!
//! Every field has a default matching the stock deployment (connections file
//! in the working directory, broker port 1883, ADC channel 2 on
//! `/dev/spidev0.0`, 10 second interval), so the settings file is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level agent settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentSettings {
    #[serde(default)]
    pub connections: ConnectionsSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub sensor: SensorSection,
}

/// Where the `topic=broker` file lives and how long to wait for it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionsSection {
    /// Path of the connections file, relative to the working directory
    #[serde(default = "default_connections_file")]
    pub file: PathBuf,
    /// Existence poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting after this many seconds (unset = wait forever)
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
}

impl Default for ConnectionsSection {
    fn default() -> Self {
        Self {
            file: default_connections_file(),
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: None,
        }
    }
}

/// MQTT session parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker port; the connections file only supplies the host
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keep alive in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Clean session flag
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    /// Capacity of the client request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: default_clean_session(),
            request_capacity: default_request_capacity(),
        }
    }
}

/// ADC wiring and sampling cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// spidev node for bus 0, device 0
    #[serde(default = "default_spi_path")]
    pub spi_path: PathBuf,
    /// SPI clock in Hz
    #[serde(default = "default_max_speed_hz")]
    pub max_speed_hz: u32,
    /// ADC channel the light dependent resistor is wired to (0..=3)
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Seconds between published readings
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            spi_path: default_spi_path(),
            max_speed_hz: default_max_speed_hz(),
            channel: default_channel(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_connections_file() -> PathBuf {
    PathBuf::from("connections.txt")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_clean_session() -> bool {
    true
}

fn default_request_capacity() -> usize {
    10
}

fn default_spi_path() -> PathBuf {
    PathBuf::from("/dev/spidev0.0")
}

fn default_max_speed_hz() -> u32 {
    1_000_000
}

fn default_channel() -> u8 {
    2
}

fn default_interval_secs() -> u64 {
    10
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Connections file has no entries")]
    NoEntries,
    #[error("Malformed connections line {line}: '{content}' (expected <topic>=<broker>)")]
    MalformedLine { line: usize, content: String },
    #[error("Topic '{0}' must have the form <component>/<id>")]
    InvalidTopic(String),
    #[error("Timed out after {0:?} waiting for {1}")]
    WaitTimedOut(Duration, String),
    #[error("Wait for {0} cancelled by shutdown")]
    WaitCancelled(String),
}

impl AgentSettings {
    /// Load settings from a TOML file and validate them
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: AgentSettings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check ranges the hardware and the MQTT client impose
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.channel > 3 {
            return Err(ConfigError::InvalidConfig(format!(
                "sensor.channel {} out of range 0..=3",
                self.sensor.channel
            )));
        }
        if self.sensor.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "sensor.interval_secs must be greater than 0".to_string(),
            ));
        }
        // rumqttc rejects keep alive below 5 seconds
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be at least 5".to_string(),
            ));
        }
        if self.mqtt.request_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.request_capacity must be greater than 0".to_string(),
            ));
        }
        if self.connections.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "connections.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn measure_interval(&self) -> Duration {
        Duration::from_secs(self.sensor.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.connections.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.connections.wait_timeout_secs.map(Duration::from_secs)
    }
}

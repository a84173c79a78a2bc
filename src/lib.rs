//! Raspberry Pi light sensor agent
//!
//! Samples a light dependent resistor through an MCP3004 ADC and publishes
//! the reading to an MQTT broker on a fixed interval.
//!
//! # Overview
//!
//! - Connections file loading (`topic=broker`)
//! - MCP3004 SPI reads and code conversions
//! - MQTT publisher with a background event loop
//! - Sampling agent lifecycle
//!
//! # Quick Start
//!
//! ```rust
//! use pi_light_agent::agent::{PublishTarget, Reading};
//! use pi_light_agent::connections::parse_connections;
//!
//! let entries = parse_connections("sensors/room1=10.0.0.5\n").unwrap();
//! let target = PublishTarget::from_entry(&entries[0]).unwrap();
//! assert_eq!(target.component, "SENSORS");
//!
//! let payload = Reading::now(&target, 20.0).to_payload().unwrap();
//! assert_eq!(payload, r#"{"component":"SENSORS","id":"room1","value":"20.000"}"#);
//! ```

pub mod agent;
pub mod config;
pub mod connections;
pub mod error;
pub mod observability;
pub mod sensor;
pub mod testing;
pub mod transport;

pub use agent::{AgentState, SensorAgent};
pub use config::{AgentSettings, ConfigError};
pub use connections::{load_connection, parse_connections, wait_for_file, ConnectionEntry};
pub use error::{AgentError, AgentResult, ErrorKind};
pub use sensor::{AnalogReader, SensorError};
pub use transport::mqtt::MqttPublisher;
pub use transport::Transport;

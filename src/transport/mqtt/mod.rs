//! MQTT publisher built on rumqttc
//!
//! - [`connection`] - pure option building, state transitions and backoff
//! - [`client`] - the publisher and its background event loop task
//!
//! ```rust,no_run
//! use pi_light_agent::transport::{MqttPublisher, PublisherParams, Transport};
//!
//! # tokio_test::block_on(async {
//! let params = PublisherParams::new("localhost", 1883, "id_12_00_00");
//! let mut publisher = MqttPublisher::new(params)?;
//! publisher.connect().await?;
//! publisher.publish("sensors/room1", r#"{"component":"SENSORS","id":"room1","value":"1.000"}"#)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;

pub use client::MqttPublisher;
pub use connection::{
    client_id_at, configure_mqtt_options, ConnectionEvent, ConnectionState, MqttError,
    PublisherParams, ReconnectConfig,
};

//! Transport layer for publishing readings
//!
//! The [`Transport`] trait is the seam between the sampling loop and the
//! MQTT client so the loop can run against a mock in tests.

pub mod mqtt;

pub use mqtt::{ConnectionState, MqttError, MqttPublisher, PublisherParams};

/// Fire-and-forget publishing transport
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Start the background delivery loop. Must not wait for the broker.
    async fn connect(&mut self) -> Result<(), MqttError>;

    /// Stop the delivery loop and close the session
    async fn disconnect(&mut self) -> Result<(), MqttError>;

    /// Enqueue a QoS 0, non-retained message without waiting for delivery
    fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError>;

    /// Current connection state as seen by the delivery loop
    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}

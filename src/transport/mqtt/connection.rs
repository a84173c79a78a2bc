//! Pure connection state management for the MQTT publisher
//!
//! Option building, client identity, state transitions and reconnect
//! backoff. Nothing here touches the network.

use crate::config::MqttSection;
use crate::connections::ConnectionEntry;
use chrono::{DateTime, Utc};
use rumqttc::MqttOptions;
use std::time::Duration;
use thiserror::Error;

/// Connection state published by the background event loop
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Publisher built, event loop not started
    Idle,
    /// Event loop started, waiting for ConnAck
    Connecting,
    /// ConnAck received
    Connected,
    /// Broker closed the session
    Disconnected(String),
    /// Network error, retrying (attempt count)
    Reconnecting(u32),
    /// Event loop has exited; no further delivery is possible
    Stopped,
}

/// Events that drive [`ConnectionState`] transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Started,
    ConnAckReceived,
    DisconnectedByBroker,
    NetworkError { attempt: u32, reason: String },
    Shutdown,
}

impl ConnectionState {
    /// Next state after an event (pure function)
    pub fn after(&self, event: &ConnectionEvent) -> ConnectionState {
        match (self, event) {
            (ConnectionState::Stopped, _) => ConnectionState::Stopped,
            (_, ConnectionEvent::Started) => ConnectionState::Connecting,
            (_, ConnectionEvent::ConnAckReceived) => ConnectionState::Connected,
            (_, ConnectionEvent::DisconnectedByBroker) => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            (_, ConnectionEvent::NetworkError { attempt, .. }) => {
                ConnectionState::Reconnecting(*attempt)
            }
            (_, ConnectionEvent::Shutdown) => ConnectionState::Stopped,
        }
    }
}

/// Reconnection backoff
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delays in milliseconds for the first attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay once the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![250, 500, 1000, 2000],
            sustained_delay: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for a 1-based attempt number
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let millis = self
            .backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay);
        Duration::from_millis(millis)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid MQTT options: {0}")]
    InvalidOptions(String),
    #[error("Event loop already started")]
    AlreadyStarted,
    #[error("Request queue full, message to '{topic}' dropped")]
    QueueFull { topic: String },
    #[error("MQTT event loop stopped - current state: {state:?}")]
    Stopped { state: ConnectionState },
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// True when dropping the current message is enough to recover
    pub fn is_transient(&self) -> bool {
        matches!(self, MqttError::QueueFull { .. })
    }
}

/// Everything needed to open the broker session
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherParams {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub clean_session: bool,
    pub request_capacity: usize,
}

impl PublisherParams {
    /// Params with the stock session settings (60 s keep alive, clean session)
    pub fn new(host: &str, port: u16, client_id: &str) -> Self {
        let defaults = MqttSection::default();
        Self {
            host: host.to_string(),
            port,
            client_id: client_id.to_string(),
            keep_alive: Duration::from_secs(defaults.keep_alive_secs),
            clean_session: defaults.clean_session,
            request_capacity: defaults.request_capacity,
        }
    }

    /// Host from the connections file, everything else from settings
    pub fn from_entry(entry: &ConnectionEntry, section: &MqttSection, client_id: String) -> Self {
        Self {
            host: entry.broker.clone(),
            port: section.port,
            client_id,
            keep_alive: Duration::from_secs(section.keep_alive_secs),
            clean_session: section.clean_session,
            request_capacity: section.request_capacity,
        }
    }
}

/// Client id derived from the agent start time: `id_HH_MM_SS`
pub fn client_id_at(started_at: DateTime<Utc>) -> String {
    format!("id_{}", started_at.format("%H_%M_%S"))
}

/// Build rumqttc options from publisher params
pub fn configure_mqtt_options(params: &PublisherParams) -> Result<MqttOptions, MqttError> {
    if params.host.is_empty() {
        return Err(MqttError::InvalidOptions("empty broker host".to_string()));
    }
    if params.client_id.is_empty() {
        return Err(MqttError::InvalidOptions("empty client id".to_string()));
    }
    if params.keep_alive < Duration::from_secs(5) {
        return Err(MqttError::InvalidOptions(format!(
            "keep alive {:?} below 5s",
            params.keep_alive
        )));
    }

    let mut mqtt_options = MqttOptions::new(&params.client_id, &params.host, params.port);
    mqtt_options.set_keep_alive(params.keep_alive);
    mqtt_options.set_clean_session(params.clean_session);

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_client_id_format() {
        let started = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 42).unwrap();
        assert_eq!(client_id_at(started), "id_07_05_42");
    }

    #[test]
    fn test_params_from_entry_ignore_entry_port() {
        let entry = ConnectionEntry {
            topic: "a/b".to_string(),
            broker: "10.0.0.5".to_string(),
        };
        let params = PublisherParams::from_entry(&entry, &MqttSection::default(), "id_x".into());
        assert_eq!(params.host, "10.0.0.5");
        assert_eq!(params.port, 1883);
        assert_eq!(params.keep_alive, Duration::from_secs(60));
        assert!(params.clean_session);
    }

    #[test]
    fn test_configure_mqtt_options() {
        let params = PublisherParams::new("localhost", 1883, "id_10_00_00");
        let options = configure_mqtt_options(&params).unwrap();

        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.client_id(), "id_10_00_00");
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.clean_session());
    }

    #[test]
    fn test_configure_rejects_empty_host() {
        let params = PublisherParams::new("", 1883, "id_10_00_00");
        assert!(matches!(
            configure_mqtt_options(&params),
            Err(MqttError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_configure_rejects_short_keep_alive() {
        let mut params = PublisherParams::new("localhost", 1883, "id_10_00_00");
        params.keep_alive = Duration::from_secs(1);
        assert!(configure_mqtt_options(&params).is_err());
    }

    #[test]
    fn test_backoff_pattern_then_sustained() {
        let config = ReconnectConfig::default();
        assert_eq!(config.calculate_backoff_delay(1), Duration::from_millis(250));
        assert_eq!(config.calculate_backoff_delay(2), Duration::from_millis(500));
        assert_eq!(config.calculate_backoff_delay(4), Duration::from_millis(2000));
        assert_eq!(config.calculate_backoff_delay(5), Duration::from_millis(5000));
        assert_eq!(config.calculate_backoff_delay(100), Duration::from_millis(5000));
    }

    #[test]
    fn test_empty_backoff_pattern_uses_sustained() {
        let config = ReconnectConfig {
            backoff_pattern: Vec::new(),
            sustained_delay: 750,
        };
        assert_eq!(config.calculate_backoff_delay(1), Duration::from_millis(750));
    }

    #[test]
    fn test_state_transitions() {
        let state = ConnectionState::Idle.after(&ConnectionEvent::Started);
        assert_eq!(state, ConnectionState::Connecting);

        let state = state.after(&ConnectionEvent::ConnAckReceived);
        assert_eq!(state, ConnectionState::Connected);

        let state = state.after(&ConnectionEvent::NetworkError {
            attempt: 3,
            reason: "connection reset".to_string(),
        });
        assert_eq!(state, ConnectionState::Reconnecting(3));

        let state = state.after(&ConnectionEvent::DisconnectedByBroker);
        assert!(matches!(state, ConnectionState::Disconnected(_)));

        let state = state.after(&ConnectionEvent::Shutdown);
        assert_eq!(state, ConnectionState::Stopped);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let state = ConnectionState::Stopped.after(&ConnectionEvent::ConnAckReceived);
        assert_eq!(state, ConnectionState::Stopped);
    }

    #[test]
    fn test_only_queue_full_is_transient() {
        assert!(MqttError::QueueFull {
            topic: "a/b".to_string()
        }
        .is_transient());
        assert!(!MqttError::Stopped {
            state: ConnectionState::Stopped
        }
        .is_transient());
        assert!(!MqttError::AlreadyStarted.is_transient());
    }
}

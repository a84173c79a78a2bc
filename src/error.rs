//! Error types for the light sensor agent
//!
//! Every failure is tagged as configuration, sensor or network so `main`
//! can pick a recovery policy and an exit code per kind.

use crate::config::ConfigError;
use crate::sensor::SensorError;
use crate::transport::MqttError;
use thiserror::Error;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Sensor,
    Network,
}

/// Main error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Network error: {0}")]
    Network(#[from] MqttError),

    #[error("Failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Config(_) => ErrorKind::Config,
            // Encoding is part of producing a reading
            AgentError::Sensor(_) | AgentError::Encode(_) => ErrorKind::Sensor,
            AgentError::Network(_) => ErrorKind::Network,
        }
    }

    /// True when the sampling loop may drop the current sample and go on
    pub fn is_recoverable(&self) -> bool {
        match self {
            AgentError::Sensor(e) => e.is_transient(),
            AgentError::Network(e) => e.is_transient(),
            AgentError::Config(_) | AgentError::Encode(_) => false,
        }
    }

    /// Process exit code for a fatal error of this kind
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            ErrorKind::Sensor => 3,
            ErrorKind::Network => 4,
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionState;

    #[test]
    fn test_config_errors_are_fatal() {
        let error: AgentError = ConfigError::NoEntries.into();
        assert_eq!(error.kind(), ErrorKind::Config);
        assert!(!error.is_recoverable());
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_dark_reading_is_recoverable() {
        let error: AgentError = SensorError::SaturatedDark { channel: 2 }.into();
        assert_eq!(error.kind(), ErrorKind::Sensor);
        assert!(error.is_recoverable());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_spi_failure_is_fatal() {
        let error: AgentError = SensorError::Transfer("EIO".to_string()).into();
        assert!(!error.is_recoverable());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_queue_full_is_recoverable() {
        let error: AgentError = MqttError::QueueFull {
            topic: "a/b".to_string(),
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::Network);
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_stopped_event_loop_is_fatal() {
        let error: AgentError = MqttError::Stopped {
            state: ConnectionState::Stopped,
        }
        .into();
        assert!(!error.is_recoverable());
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn test_encode_failure_counts_as_reading_failure() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: AgentError = source.into();
        assert_eq!(error.kind(), ErrorKind::Sensor);
        assert!(!error.is_recoverable());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_error_display_names_kind() {
        let error: AgentError = ConfigError::InvalidTopic("sensors".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Configuration error: Topic 'sensors' must have the form <component>/<id>"
        );
    }
}

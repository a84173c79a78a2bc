//! Mock implementations for testing
//!
//! Provides a mock [`Transport`] and a mock SPI device so the sampling loop
//! can run without a broker or a Raspberry Pi.

use crate::transport::{ConnectionState, MqttError, Transport};
use async_trait::async_trait;
use embedded_hal::spi::{self, ErrorType, Operation, SpiDevice};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub type PublishedMessage = (String, String);

/// How a [`MockTransport`] rejects publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    QueueFull,
    Stopped,
}

#[derive(Debug, Default)]
struct TransportLog {
    published: Vec<PublishedMessage>,
    connects: usize,
    disconnects: usize,
    connected: bool,
    failure: Option<PublishFailure>,
}

/// Mock transport for testing. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose publishes always fail with `failure`
    pub fn with_failure(failure: PublishFailure) -> Self {
        let transport = Self::new();
        transport.set_failure(Some(failure));
        transport
    }

    pub fn set_failure(&self, failure: Option<PublishFailure>) {
        self.lock().failure = failure;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), MqttError> {
        let mut log = self.lock();
        if log.connected {
            return Err(MqttError::AlreadyStarted);
        }
        log.connects += 1;
        log.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        let mut log = self.lock();
        log.disconnects += 1;
        log.connected = false;
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError> {
        let mut log = self.lock();
        match log.failure {
            Some(PublishFailure::QueueFull) => Err(MqttError::QueueFull {
                topic: topic.to_string(),
            }),
            Some(PublishFailure::Stopped) => Err(MqttError::Stopped {
                state: ConnectionState::Stopped,
            }),
            None => {
                log.published.push((topic.to_string(), payload.to_string()));
                Ok(())
            }
        }
    }

    fn connection_state(&self) -> ConnectionState {
        if self.lock().connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Idle
        }
    }
}

/// Error returned by a failing [`MockSpi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSpiError;

impl spi::Error for MockSpiError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct SpiScript {
    responses: VecDeque<[u8; 3]>,
    last: [u8; 3],
    sent: Vec<[u8; 3]>,
    fail: bool,
}

/// Scripted MCP3004 stand-in.
///
/// Each 3-byte transfer is answered with the next scripted frame; the last
/// frame repeats once the script runs out. Clones share the same script so
/// tests can inspect what the reader sent.
#[derive(Debug, Clone, Default)]
pub struct MockSpi {
    script: Arc<Mutex<SpiScript>>,
}

impl MockSpi {
    /// Answer transfers with the given 10-bit codes in order
    pub fn with_codes(codes: &[u16]) -> Self {
        let frames: Vec<[u8; 3]> = codes
            .iter()
            .map(|code| [0x00, ((code >> 8) & 0b11) as u8, (code & 0xFF) as u8])
            .collect();
        Self::with_frames(&frames)
    }

    /// Answer transfers with raw frames in order
    pub fn with_frames(frames: &[[u8; 3]]) -> Self {
        let script = SpiScript {
            responses: frames.iter().copied().collect(),
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Device whose every transfer fails
    pub fn failing() -> Self {
        let script = SpiScript {
            fail: true,
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Frames written by the reader, in order
    pub fn sent_frames(&self) -> Vec<[u8; 3]> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SpiScript> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut script = self.lock();
        if script.fail {
            return Err(MockSpiError);
        }

        for operation in operations.iter_mut() {
            if let Operation::TransferInPlace(buf) = operation {
                let mut sent = [0u8; 3];
                for (dst, src) in sent.iter_mut().zip(buf.iter()) {
                    *dst = *src;
                }
                script.sent.push(sent);

                let response = match script.responses.pop_front() {
                    Some(frame) => {
                        script.last = frame;
                        frame
                    }
                    None => script.last,
                };
                for (dst, src) in buf.iter_mut().zip(response.iter()) {
                    *dst = *src;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_spi_repeats_last_frame() {
        let mut spi = MockSpi::with_codes(&[5, 700]);
        let mut buf = [0x01, 0xA0, 0x00];

        spi.transfer_in_place(&mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x05]);

        for _ in 0..2 {
            let mut buf = [0x01, 0xA0, 0x00];
            spi.transfer_in_place(&mut buf).unwrap();
            assert_eq!(buf, [0x00, 0x02, 0xBC]);
        }
        assert_eq!(spi.sent_frames().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_records_publishes() {
        let mut transport = MockTransport::new();
        let observer = transport.clone();

        transport.connect().await.unwrap();
        assert!(observer.is_connected());
        transport.publish("a/b", "{}").unwrap();

        assert_eq!(observer.published(), vec![("a/b".to_string(), "{}".to_string())]);
        assert_eq!(observer.connect_count(), 1);
    }

    #[test]
    fn test_mock_transport_failure_modes() {
        let transport = MockTransport::with_failure(PublishFailure::QueueFull);
        assert!(matches!(
            transport.publish("a/b", "{}"),
            Err(MqttError::QueueFull { .. })
        ));

        transport.set_failure(Some(PublishFailure::Stopped));
        assert!(matches!(
            transport.publish("a/b", "{}"),
            Err(MqttError::Stopped { .. })
        ));
        assert!(transport.published().is_empty());
    }
}

//! Impure I/O side of the MQTT publisher
//!
//! Owns the rumqttc client and drives its event loop on a background task.
//! The task exclusively owns the socket, logs ConnAck, and keeps polling
//! through network errors so rumqttc reconnects on its own.

use super::connection::{
    configure_mqtt_options, ConnectionEvent, ConnectionState, MqttError, PublisherParams,
    ReconnectConfig,
};
use crate::observability::metrics::metrics;
use crate::transport::Transport;
use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn, Instrument};

/// How long a graceful disconnect may take before the loop is cancelled
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// QoS 0 publisher with a background delivery loop
pub struct MqttPublisher {
    params: PublisherParams,
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: Option<watch::Sender<bool>>,
    event_loop_handle: Option<JoinHandle<()>>,
    reconnect_config: ReconnectConfig,
}

impl MqttPublisher {
    pub fn new(params: PublisherParams) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(&params)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, params.request_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        Ok(Self {
            params,
            client,
            event_loop: Mutex::new(Some(event_loop)),
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx: None,
            event_loop_handle: None,
            reconnect_config: ReconnectConfig::default(),
        })
    }

    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    /// Watch connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn transition(state_tx: &watch::Sender<ConnectionState>, event: ConnectionEvent) {
        state_tx.send_modify(|state| *state = state.after(&event));
    }

    async fn run_event_loop(
        mut event_loop: EventLoop,
        client_id: String,
        state_tx: Arc<watch::Sender<ConnectionState>>,
        mut shutdown_rx: watch::Receiver<bool>,
        reconnect_config: ReconnectConfig,
    ) {
        info!("Starting MQTT event loop for client: {}", client_id);
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            let code = ack.code as u8;
                            attempts = 0;
                            Self::transition(&state_tx, ConnectionEvent::ConnAckReceived);
                            metrics().connection_established();
                            info!(
                                client_id = %client_id,
                                result_code = code,
                                "[{}]: ClientID: {}; Connected with result code {}",
                                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                                client_id,
                                code
                            );
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            metrics().set_mqtt_connected(false);
                            Self::transition(&state_tx, ConnectionEvent::DisconnectedByBroker);
                            warn!("Broker closed the session for client {}", client_id);
                        }
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                            debug!("DISCONNECT sent for client {}", client_id);
                            break;
                        }
                        Ok(event) => {
                            trace!(target: "mqtt_transport", "MQTT event: {:?}", event);
                        }
                        Err(e) => {
                            attempts = attempts.saturating_add(1);
                            metrics().set_mqtt_connected(false);
                            Self::transition(
                                &state_tx,
                                ConnectionEvent::NetworkError {
                                    attempt: attempts,
                                    reason: e.to_string(),
                                },
                            );

                            let delay = reconnect_config.calculate_backoff_delay(attempts);
                            error!(
                                "MQTT event loop error for client {}: {} (retry {} in {:?})",
                                client_id, e, attempts, delay
                            );

                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = shutdown_rx.changed() => {
                                    if *shutdown_rx.borrow() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        metrics().set_mqtt_connected(false);
        Self::transition(&state_tx, ConnectionEvent::Shutdown);
        info!("MQTT event loop stopped for client: {}", client_id);
    }
}

#[async_trait]
impl Transport for MqttPublisher {
    async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .get_mut()
            .take()
            .ok_or(MqttError::AlreadyStarted)?;

        info!(
            "Connecting to {}:{} as {}",
            self.params.host, self.params.port, self.params.client_id
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self::transition(&self.state_tx, ConnectionEvent::Started);

        let span = crate::mqtt_span!(
            client_id = %self.params.client_id,
            broker = %self.params.host
        );
        let handle = tokio::spawn(
            Self::run_event_loop(
                event_loop,
                self.params.client_id.clone(),
                self.state_tx.clone(),
                shutdown_rx,
                self.reconnect_config.clone(),
            )
            .instrument(span),
        );

        self.shutdown_tx = Some(shutdown_tx);
        self.event_loop_handle = Some(handle);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        let Some(mut handle) = self.event_loop_handle.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        let flushed = if self.is_connected() {
            match self.client.try_disconnect() {
                // Give the loop a chance to flush DISCONNECT before cancelling it
                Ok(()) => tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                    .await
                    .is_ok(),
                Err(e) => {
                    result = Err(MqttError::DisconnectFailed(e));
                    false
                }
            }
        } else {
            false
        };

        if !flushed {
            if let Some(shutdown_tx) = &self.shutdown_tx {
                let _ = shutdown_tx.send(true);
            }
            if let Err(e) = handle.await {
                warn!("MQTT event loop task failed: {}", e);
            }
        }

        self.shutdown_tx = None;
        info!("Disconnected client {}", self.params.client_id);
        result
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError> {
        let state = self.connection_state();
        if state == ConnectionState::Stopped {
            return Err(MqttError::Stopped { state });
        }

        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|_| {
                let state = self.connection_state();
                if state == ConnectionState::Stopped {
                    MqttError::Stopped { state }
                } else {
                    MqttError::QueueFull {
                        topic: topic.to_string(),
                    }
                }
            })?;

        println!("{payload}");
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }
}

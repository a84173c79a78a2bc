//! Sensor agent lifecycle
//!
//! `AwaitingConfig -> Connecting -> Sampling -> Terminated`
//!
//! The agent waits for the connections file, starts the transport for the
//! first entry, then samples and publishes on a fixed-rate ticker until a
//! shutdown signal or a fatal error.

use super::reading::{PublishTarget, Reading};
use crate::config::{AgentSettings, ConfigError};
use crate::connections::{load_connection, wait_for_file, ConnectionEntry};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics::metrics;
use crate::sample_span;
use crate::sensor::AnalogReader;
use crate::transport::mqtt::client_id_at;
use crate::transport::{MqttError, PublisherParams, Transport};
use chrono::{DateTime, Utc};
use embedded_hal::spi::SpiDevice;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingConfig,
    Connecting,
    Sampling,
    Terminated,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::AwaitingConfig => "awaiting_config",
            AgentState::Connecting => "connecting",
            AgentState::Sampling => "sampling",
            AgentState::Terminated => "terminated",
        }
    }
}

/// Light sensor agent owning the ADC reader for its whole life
pub struct SensorAgent<S: SpiDevice> {
    settings: AgentSettings,
    reader: AnalogReader<S>,
    shutdown: watch::Receiver<bool>,
    started_at: DateTime<Utc>,
    state: AgentState,
}

impl<S: SpiDevice> SensorAgent<S> {
    pub fn new(
        settings: AgentSettings,
        reader: AnalogReader<S>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            reader,
            shutdown,
            started_at: Utc::now(),
            state: AgentState::AwaitingConfig,
        }
    }

    /// Override the start time the client id is derived from
    pub fn with_start_time(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    fn set_state(&mut self, state: AgentState) {
        debug!(
            "Agent state: {} -> {}",
            self.state.as_str(),
            state.as_str()
        );
        self.state = state;
        metrics().set_agent_state(state.as_str());
    }

    /// Drive the agent through its lifecycle.
    ///
    /// `build_transport` receives the session parameters once the
    /// connections file is known. Returns `Ok(())` on a shutdown signal.
    pub async fn run<T, F>(mut self, build_transport: F) -> AgentResult<()>
    where
        T: Transport,
        F: FnOnce(PublisherParams) -> Result<T, MqttError>,
    {
        let result = self.run_states(build_transport).await;
        self.set_state(AgentState::Terminated);

        match &result {
            Ok(()) => info!("Agent terminated after shutdown signal"),
            Err(e) => error!("Agent terminated: {}", e),
        }
        result
    }

    async fn run_states<T, F>(&mut self, build_transport: F) -> AgentResult<()>
    where
        T: Transport,
        F: FnOnce(PublisherParams) -> Result<T, MqttError>,
    {
        self.set_state(AgentState::AwaitingConfig);
        let entry = match self.await_connection().await {
            Ok(entry) => entry,
            Err(ConfigError::WaitCancelled(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        self.set_state(AgentState::Connecting);
        let target = PublishTarget::from_entry(&entry)?;
        info!(
            "Connecting to: {} pub on topic: {}",
            entry.broker, entry.topic
        );

        let params = PublisherParams::from_entry(
            &entry,
            &self.settings.mqtt,
            client_id_at(self.started_at),
        );
        let mut transport = build_transport(params)?;
        transport.connect().await?;

        self.set_state(AgentState::Sampling);
        let result = self.sample_until_shutdown(&transport, &target).await;

        if let Err(e) = transport.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", e);
        }
        result
    }

    async fn await_connection(&self) -> Result<ConnectionEntry, ConfigError> {
        let path = &self.settings.connections.file;
        wait_for_file(
            path,
            self.settings.poll_interval(),
            self.settings.wait_timeout(),
            self.shutdown.clone(),
        )
        .await?;
        load_connection(path)
    }

    async fn sample_until_shutdown<T: Transport>(
        &mut self,
        transport: &T,
        target: &PublishTarget,
    ) -> AgentResult<()> {
        let period = self.settings.measure_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.clone();

        info!(
            "Sampling channel {} every {:?}",
            self.settings.sensor.channel, period
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sample_once(transport, target) {
                        Ok(()) => {}
                        Err(e) if e.is_recoverable() => {
                            metrics().sample_skipped();
                            warn!("Skipping sample: {}", e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, leaving sampling loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Read the light metric once and publish it
    pub fn sample_once<T: Transport>(
        &mut self,
        transport: &T,
        target: &PublishTarget,
    ) -> AgentResult<()> {
        let channel = self.settings.sensor.channel;
        let span = sample_span!(channel, topic = %target.topic);
        let _guard = span.enter();

        metrics().sample_taken();
        let value = self.reader.light_resistance(channel)?;
        let reading = Reading::now(target, value);
        let payload = reading.to_payload()?;

        transport
            .publish(&target.topic, &payload)
            .map_err(|e| {
                metrics().publish_failed();
                AgentError::from(e)
            })?;

        metrics().sample_published();
        debug!(
            "[{}] published {} to {}",
            reading.formatted_timestamp(),
            payload,
            target.topic
        );
        Ok(())
    }
}

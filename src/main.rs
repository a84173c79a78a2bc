//! Light sensor agent - Main Entry Point

use clap::{Parser, Subcommand};
use pi_light_agent::agent::SensorAgent;
use pi_light_agent::config::{AgentSettings, ConfigError};
use pi_light_agent::error::{AgentError, AgentResult};
use pi_light_agent::observability::{init_default_logging, metrics};
use pi_light_agent::sensor::{open_spidev, AnalogReader};
use pi_light_agent::transport::MqttPublisher;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_SETTINGS_FILE: &str = "pi-light-agent.toml";

/// Raspberry Pi light sensor publishing to MQTT
#[derive(Parser)]
#[command(name = "pi-light-agent")]
#[command(about = "Publish light sensor readings to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Settings file path
    #[arg(short, long, value_name = "FILE", env = "PI_LIGHT_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the connections file, then sample and publish until stopped
    Run {
        /// Connections file (`topic=broker` per line)
        #[arg(long, value_name = "FILE")]
        connections: Option<PathBuf>,

        /// Seconds between samples
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Sample the sensor once and print the reading
    Read {
        /// ADC channel (0-3)
        #[arg(long)]
        channel: Option<u8>,
    },
    /// Validate settings
    Config {
        /// Print the effective settings as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting pi-light-agent v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            process::exit(AgentError::from(e).exit_code());
        }
    };

    let result = match cli.command {
        Commands::Run {
            connections,
            interval,
        } => match apply_overrides(&mut settings, connections, interval) {
            Ok(()) => run_agent(settings).await,
            Err(e) => Err(e.into()),
        },
        Commands::Read { channel } => read_once(&settings, channel),
        Commands::Config { show } => handle_config_command(&settings, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(e.exit_code());
    }

    info!("Application shutdown complete");
}

fn load_settings(path: Option<&Path>) -> Result<AgentSettings, ConfigError> {
    match path {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            AgentSettings::load_from_file(path)
        }
        None => {
            let default_path = Path::new(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                info!("Loading settings from: {}", default_path.display());
                AgentSettings::load_from_file(default_path)
            } else {
                info!("No settings file found, using defaults");
                Ok(AgentSettings::default())
            }
        }
    }
}

fn apply_overrides(
    settings: &mut AgentSettings,
    connections: Option<PathBuf>,
    interval: Option<u64>,
) -> Result<(), ConfigError> {
    if let Some(file) = connections {
        settings.connections.file = file;
    }
    if let Some(secs) = interval {
        settings.sensor.interval_secs = secs;
    }
    settings.validate()
}

async fn run_agent(settings: AgentSettings) -> AgentResult<()> {
    let collector = metrics();
    collector.set_agent_state("initializing");

    let spi = open_spidev(&settings.sensor)?;
    let reader = AnalogReader::new(spi);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent = SensorAgent::new(settings, reader, shutdown_rx);

    let run = agent.run(MqttPublisher::new);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = wait_for_shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            run.await
        }
    };

    match serde_json::to_string(&collector.snapshot()) {
        Ok(snapshot) => info!("Final metrics: {}", snapshot),
        Err(e) => warn!("Failed to encode metrics snapshot: {}", e),
    }
    result
}

/// Resolve on SIGINT or SIGTERM
async fn wait_for_shutdown_signal() {
    let signals = signal::unix::signal(signal::unix::SignalKind::interrupt()).and_then(|sigint| {
        signal::unix::signal(signal::unix::SignalKind::terminate()).map(|sigterm| (sigint, sigterm))
    });

    let (mut sigint, mut sigterm) = match signals {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

fn read_once(settings: &AgentSettings, channel: Option<u8>) -> AgentResult<()> {
    let channel = channel.unwrap_or(settings.sensor.channel);
    let spi = open_spidev(&settings.sensor)?;
    let mut reader = AnalogReader::new(spi);

    let sample = reader.sample(channel)?;
    println!(
        "channel {}: code {} ({:.3} V)",
        sample.channel, sample.code, sample.volts
    );
    match sample.resistance_kohm {
        Some(kohm) => println!("resistance: {kohm:.3} kOhm"),
        None => println!("resistance: saturated (dark)"),
    }
    println!("temperature: {:.1} C", sample.celsius);
    Ok(())
}

fn handle_config_command(settings: &AgentSettings, show: bool) -> AgentResult<()> {
    if show {
        let rendered = toml::to_string_pretty(settings)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        println!("Current settings:");
        println!("{rendered}");
    }

    info!("Settings validation complete");
    Ok(())
}

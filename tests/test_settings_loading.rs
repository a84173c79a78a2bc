//! Settings loading and validation tests

use pi_light_agent::config::{AgentSettings, ConfigError};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_settings_load_from_full_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[connections]
file = "/etc/pi-light/connections.txt"
poll_interval_ms = 500
wait_timeout_secs = 120

[mqtt]
port = 8883
keep_alive_secs = 30
clean_session = false
request_capacity = 32

[sensor]
spi_path = "/dev/spidev0.1"
max_speed_hz = 500000
channel = 0
interval_secs = 5
"#
    )
    .unwrap();

    let settings = AgentSettings::load_from_file(temp_file.path()).unwrap();

    assert_eq!(
        settings.connections.file,
        PathBuf::from("/etc/pi-light/connections.txt")
    );
    assert_eq!(settings.poll_interval(), Duration::from_millis(500));
    assert_eq!(settings.wait_timeout(), Some(Duration::from_secs(120)));
    assert_eq!(settings.mqtt.port, 8883);
    assert!(!settings.mqtt.clean_session);
    assert_eq!(settings.mqtt.request_capacity, 32);
    assert_eq!(settings.sensor.spi_path, PathBuf::from("/dev/spidev0.1"));
    assert_eq!(settings.sensor.channel, 0);
    assert_eq!(settings.measure_interval(), Duration::from_secs(5));
}

#[test]
fn test_settings_missing_sections_fall_back_to_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[sensor]\ninterval_secs = 30").unwrap();

    let settings = AgentSettings::load_from_file(temp_file.path()).unwrap();
    assert_eq!(settings.measure_interval(), Duration::from_secs(30));
    assert_eq!(settings.sensor.channel, 2);
    assert_eq!(settings.mqtt.port, 1883);
    assert_eq!(settings.connections.file, PathBuf::from("connections.txt"));
    assert_eq!(settings.wait_timeout(), None);
}

#[test]
fn test_settings_reject_out_of_range_channel() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[sensor]\nchannel = 4").unwrap();

    assert!(matches!(
        AgentSettings::load_from_file(temp_file.path()),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
fn test_settings_reject_malformed_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[sensor\nchannel = 2").unwrap();

    assert!(matches!(
        AgentSettings::load_from_file(temp_file.path()),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_settings_missing_file() {
    let result = AgentSettings::load_from_file(std::path::Path::new("/nonexistent/agent.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

//! Analog light sensor behind an MCP3004-class SPI ADC
//!
//! - [`adc`] - channel reads and the raw code conversions
//! - [`spi`] - opening and configuring the Linux spidev node

pub mod adc;
pub mod spi;

pub use adc::{
    code_to_resistance, code_to_volts, volts_to_celsius, AnalogReader, ChannelSample, ADC_CHANNELS,
    ADC_MAX_CODE, VREF,
};
pub use spi::open_spidev;

use thiserror::Error;

/// Sensor access errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Failed to open SPI device {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("SPI transfer failed: {0}")]
    Transfer(String),
    #[error("ADC channel {0} out of range 0..=3")]
    InvalidChannel(u8),
    #[error("ADC channel {channel} reads 0, light resistance is unbounded")]
    SaturatedDark { channel: u8 },
}

impl SensorError {
    /// True when skipping the current sample is enough to recover
    pub fn is_transient(&self) -> bool {
        matches!(self, SensorError::SaturatedDark { .. })
    }
}

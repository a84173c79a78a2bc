//! MCP3004 channel reads and code conversions
//!
//! The conversions are free functions so they can be checked without
//! hardware; [`AnalogReader`] only adds the SPI framing on top.

use super::SensorError;
use embedded_hal::spi::SpiDevice;
use tracing::{debug, trace};

/// Number of single-ended inputs on the converter
pub const ADC_CHANNELS: u8 = 4;

/// Highest 10-bit code
pub const ADC_MAX_CODE: u16 = 1023;

/// Reference voltage of the converter
pub const VREF: f64 = 3.3;

/// Series resistor of the LDR divider, in kOhm
const DIVIDER_KOHM: f64 = 10.0;

/// Convert a raw code to volts: `code * 3.3 / 1024`
pub fn code_to_volts(code: u16) -> f64 {
    f64::from(code) * VREF / 1024.0
}

/// Light dependent resistor value for a raw code.
///
/// Resistance falls as light rises, so brighter readings give smaller
/// values. A code of 0 has no finite resistance and is reported as
/// [`SensorError::SaturatedDark`].
pub fn code_to_resistance(channel: u8, code: u16) -> Result<f64, SensorError> {
    if code == 0 {
        return Err(SensorError::SaturatedDark { channel });
    }
    let code = code.min(ADC_MAX_CODE);
    Ok(f64::from(ADC_MAX_CODE - code) * DIVIDER_KOHM / f64::from(code))
}

/// TMP36-style conversion: 500 mV offset, 10 mV per degree
pub fn volts_to_celsius(volts: f64) -> f64 {
    (volts * 1000.0 - 500.0) / 10.0
}

/// Every derived value of a single conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSample {
    pub channel: u8,
    pub code: u16,
    pub volts: f64,
    /// `None` when the code is 0 (fully dark)
    pub resistance_kohm: Option<f64>,
    pub celsius: f64,
}

impl ChannelSample {
    pub fn from_code(channel: u8, code: u16) -> Self {
        let volts = code_to_volts(code);
        Self {
            channel,
            code,
            volts,
            resistance_kohm: code_to_resistance(channel, code).ok(),
            celsius: volts_to_celsius(volts),
        }
    }
}

/// Owns the SPI handle for the converter.
///
/// The handle is acquired once at startup and closed when the reader is
/// dropped.
pub struct AnalogReader<S: SpiDevice> {
    spi: S,
}

impl<S: SpiDevice> AnalogReader<S> {
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Read the 10-bit code of a single-ended channel
    pub fn read(&mut self, channel: u8) -> Result<u16, SensorError> {
        if channel >= ADC_CHANNELS {
            return Err(SensorError::InvalidChannel(channel));
        }

        // start bit, single-ended + channel select, don't care
        let mut frame = [0x01, (8 + channel) << 4, 0x00];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(|e| SensorError::Transfer(format!("{e:?}")))?;

        let code = (u16::from(frame[1] & 0b11) << 8) | u16::from(frame[2]);
        trace!(channel, code, "ADC read");
        Ok(code)
    }

    /// Voltage and raw code of a channel
    pub fn level(&mut self, channel: u8) -> Result<(f64, u16), SensorError> {
        let code = self.read(channel)?;
        Ok((code_to_volts(code), code))
    }

    /// Light dependent resistor value on a channel
    pub fn light_resistance(&mut self, channel: u8) -> Result<f64, SensorError> {
        let code = self.read(channel)?;
        code_to_resistance(channel, code)
    }

    /// One transfer, all conversions derived from the same code
    pub fn sample(&mut self, channel: u8) -> Result<ChannelSample, SensorError> {
        let code = self.read(channel)?;
        Ok(ChannelSample::from_code(channel, code))
    }

    /// Temperature in Celsius for a TMP36 wired to a channel
    pub fn temperature(&mut self, channel: u8) -> Result<f64, SensorError> {
        let (volts, _) = self.level(channel)?;
        Ok(volts_to_celsius(volts))
    }
}

impl<S: SpiDevice> Drop for AnalogReader<S> {
    fn drop(&mut self) {
        debug!("Releasing ADC SPI handle");
    }
}

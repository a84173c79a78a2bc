//! Linux spidev access

use super::SensorError;
use crate::config::SensorSection;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use tracing::info;

/// Open and configure the spidev node for the converter (mode 0, 8-bit words)
pub fn open_spidev(section: &SensorSection) -> Result<SpidevDevice, SensorError> {
    let path = section.spi_path.display().to_string();

    let mut device = SpidevDevice::open(&section.spi_path).map_err(|e| SensorError::Open {
        path: path.clone(),
        reason: format!("{e:?}"),
    })?;

    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(section.max_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    device
        .0
        .configure(&options)
        .map_err(|e| SensorError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    info!(
        "Opened SPI device {} at {} Hz",
        path, section.max_speed_hz
    );
    Ok(device)
}

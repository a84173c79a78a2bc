//! Testing utilities and mock implementations
//!
//! Mocks for the MQTT transport and the SPI bus so the agent can be driven
//! without a broker or sensor hardware.

pub mod mocks;

pub use mocks::*;

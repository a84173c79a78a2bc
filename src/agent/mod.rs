//! Sampling agent
//!
//! Waits for the connections file, connects the publisher and publishes a
//! light reading on every tick.

pub mod lifecycle;
pub mod reading;

pub use lifecycle::{AgentState, SensorAgent};
pub use reading::{PublishTarget, Reading, ReadingMessage};

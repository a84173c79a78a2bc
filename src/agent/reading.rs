//! Readings and their wire form

use crate::config::ConfigError;
use crate::connections::ConnectionEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where readings go and how they are labelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub topic: String,
    /// Uppercased first topic segment
    pub component: String,
    /// Second topic segment
    pub component_id: String,
}

impl PublishTarget {
    pub fn from_entry(entry: &ConnectionEntry) -> Result<Self, ConfigError> {
        let (component, component_id) = entry.component_ids()?;
        Ok(Self {
            topic: entry.topic.clone(),
            component,
            component_id,
        })
    }
}

/// One light sample
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub component_id: String,
    pub value: f64,
}

/// JSON body published for a reading
///
/// `value` is a string with exactly three decimals, e.g. `"512.345"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingMessage {
    pub component: String,
    pub id: String,
    pub value: String,
}

impl ReadingMessage {
    pub fn new(component: &str, id: &str, value: f64) -> Self {
        Self {
            component: component.to_uppercase(),
            id: id.to_string(),
            value: format!("{value:.3}"),
        }
    }
}

impl Reading {
    /// Reading stamped with the current UTC time
    pub fn now(target: &PublishTarget, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            component: target.component.clone(),
            component_id: target.component_id.clone(),
            value,
        }
    }

    /// Millisecond precision UTC timestamp
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }

    pub fn to_message(&self) -> ReadingMessage {
        ReadingMessage::new(&self.component, &self.component_id, self.value)
    }

    /// Compact JSON payload
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_message())
    }
}

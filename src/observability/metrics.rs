//! Thread-safe metrics collection
//!
//! Atomic counters shared by the sampling loop and the MQTT event loop task.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics and a mutex for the state name
pub struct MetricsCollector {
    samples_taken: AtomicU64,
    samples_published: AtomicU64,
    samples_skipped: AtomicU64,
    publish_failures: AtomicU64,
    last_sample_at: AtomicU64,

    mqtt_connected: AtomicBool,
    connections_established: AtomicU64,

    agent_state: Mutex<String>,
    uptime_start: AtomicU64,
}

/// Point-in-time copy of every metric
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub samples_taken: u64,
    pub samples_published: u64,
    pub samples_skipped: u64,
    pub publish_failures: u64,
    pub last_sample_at: u64,
    pub mqtt_connected: bool,
    pub connections_established: u64,
    pub agent_state: String,
    pub uptime_secs: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            samples_taken: AtomicU64::new(0),
            samples_published: AtomicU64::new(0),
            samples_skipped: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            last_sample_at: AtomicU64::new(0),
            mqtt_connected: AtomicBool::new(false),
            connections_established: AtomicU64::new(0),
            agent_state: Mutex::new("initializing".to_string()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn sample_taken(&self) {
        self.samples_taken.fetch_add(1, Ordering::Relaxed);
        self.last_sample_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn sample_published(&self) {
        self.samples_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sample_skipped(&self) {
        self.samples_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(true, Ordering::Relaxed);
    }

    pub fn set_mqtt_connected(&self, connected: bool) {
        self.mqtt_connected.store(connected, Ordering::Relaxed);
    }

    pub fn set_agent_state(&self, state: &str) {
        if let Ok(mut current) = self.agent_state.lock() {
            *current = state.to_string();
        }
    }

    pub fn agent_state(&self) -> String {
        self.agent_state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_taken: self.samples_taken.load(Ordering::Relaxed),
            samples_published: self.samples_published.load(Ordering::Relaxed),
            samples_skipped: self.samples_skipped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            last_sample_at: self.last_sample_at.load(Ordering::Relaxed),
            mqtt_connected: self.mqtt_connected.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            agent_state: self.agent_state(),
            uptime_secs: current_timestamp()
                .saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.samples_taken, 0);
        assert_eq!(snapshot.samples_published, 0);
        assert_eq!(snapshot.samples_skipped, 0);
        assert_eq!(snapshot.publish_failures, 0);
        assert!(!snapshot.mqtt_connected);
        assert_eq!(snapshot.agent_state, "initializing");
    }

    #[test]
    fn test_sample_counters() {
        let collector = MetricsCollector::new();
        collector.sample_taken();
        collector.sample_taken();
        collector.sample_published();
        collector.sample_skipped();
        collector.publish_failed();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.samples_taken, 2);
        assert_eq!(snapshot.samples_published, 1);
        assert_eq!(snapshot.samples_skipped, 1);
        assert_eq!(snapshot.publish_failures, 1);
        assert!(snapshot.last_sample_at > 0);
    }

    #[test]
    fn test_connection_tracking() {
        let collector = MetricsCollector::new();
        collector.connection_established();
        assert!(collector.snapshot().mqtt_connected);

        collector.set_mqtt_connected(false);
        let snapshot = collector.snapshot();
        assert!(!snapshot.mqtt_connected);
        assert_eq!(snapshot.connections_established, 1);
    }

    #[test]
    fn test_agent_state() {
        let collector = MetricsCollector::new();
        collector.set_agent_state("sampling");
        assert_eq!(collector.agent_state(), "sampling");
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        let json = serde_json::to_value(collector.snapshot()).unwrap();
        assert_eq!(json["samples_taken"], 0);
        assert_eq!(json["agent_state"], "initializing");
    }
}

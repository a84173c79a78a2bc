//! Connections file loader
//!
//! The connections file is dropped next to the agent by an external
//! provisioning step. Each line maps a topic to a broker host:
//!
//! ```text
//! sensors/room1=10.0.0.5
//! ```
//!
//! Only the first entry is used.

use crate::config::ConfigError;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// A single `topic=broker` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub topic: String,
    pub broker: String,
}

impl ConnectionEntry {
    /// Split the topic into the uppercased component name and component id
    pub fn component_ids(&self) -> Result<(String, String), ConfigError> {
        let mut segments = self.topic.split('/');
        match (segments.next(), segments.next()) {
            (Some(component), Some(id)) if !component.is_empty() && !id.is_empty() => {
                Ok((component.to_uppercase(), id.to_string()))
            }
            _ => Err(ConfigError::InvalidTopic(self.topic.clone())),
        }
    }
}

/// Parse every entry of a connections file, in file order
pub fn parse_connections(content: &str) -> Result<Vec<ConnectionEntry>, ConfigError> {
    let mut entries = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        if raw_line.trim().is_empty() {
            continue;
        }

        let malformed = || ConfigError::MalformedLine {
            line: index + 1,
            content: raw_line.to_string(),
        };

        let parts: Vec<&str> = raw_line.split('=').collect();
        if parts.len() != 2 {
            return Err(malformed());
        }

        let topic = parts[0].trim();
        let broker = parts[1].trim();
        if topic.is_empty() || broker.is_empty() {
            return Err(malformed());
        }

        entries.push(ConnectionEntry {
            topic: topic.to_string(),
            broker: broker.to_string(),
        });
    }

    if entries.is_empty() {
        return Err(ConfigError::NoEntries);
    }

    Ok(entries)
}

/// Read the connections file and return its first entry
pub fn load_connection(path: &Path) -> Result<ConnectionEntry, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut entries = parse_connections(&content)?.into_iter();

    let first = entries.next().ok_or(ConfigError::NoEntries)?;
    let ignored = entries.count();
    if ignored > 0 {
        debug!(
            "Ignoring {} additional connection entries in {}",
            ignored,
            path.display()
        );
    }

    Ok(first)
}

/// Block until `path` exists.
///
/// Polls once per `poll_interval`. Returns `WaitTimedOut` once `timeout`
/// elapses and `WaitCancelled` as soon as `shutdown` flips to true.
pub async fn wait_for_file(
    path: &Path,
    poll_interval: Duration,
    timeout: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConfigError> {
    let started = Instant::now();
    let mut announced = false;

    loop {
        if *shutdown.borrow() {
            return Err(ConfigError::WaitCancelled(path.display().to_string()));
        }

        if path.exists() {
            debug!("Found {} after {:?}", path.display(), started.elapsed());
            return Ok(());
        }

        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                return Err(ConfigError::WaitTimedOut(
                    limit,
                    path.display().to_string(),
                ));
            }
        }

        if !announced {
            info!("Waiting for {} to appear...", path.display());
            announced = true;
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            changed = shutdown.changed() => {
                // A dropped sender can never signal shutdown; keep polling
                if changed.is_err() {
                    sleep(poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_entry() {
        let entries = parse_connections("sensors/room1=10.0.0.5\n").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].topic, "sensors/room1");
        assert_eq!(entries[0].broker, "10.0.0.5");

        let (component, id) = entries[0].component_ids().unwrap();
        assert_eq!(component, "SENSORS");
        assert_eq!(id, "room1");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let entries = parse_connections("  light/kitchen =  broker.local  \r\n").unwrap();
        assert_eq!(entries[0].topic, "light/kitchen");
        assert_eq!(entries[0].broker, "broker.local");
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let entries = parse_connections("a/1=host-a\nb/2=host-b\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].broker, "host-a");
        assert_eq!(entries[1].broker, "host-b");
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let entries = parse_connections("\n  \na/b=localhost\n\n").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_empty_content() {
        assert!(matches!(parse_connections(""), Err(ConfigError::NoEntries)));
        assert!(matches!(
            parse_connections("\n\n"),
            Err(ConfigError::NoEntries)
        ));
    }

    #[test]
    fn test_parse_missing_separator() {
        let result = parse_connections("a/b=localhost\njust-a-topic\n");
        match result {
            Err(ConfigError::MalformedLine { line, content }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "just-a-topic");
            }
            other => panic!("expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_too_many_separators() {
        assert!(matches!(
            parse_connections("a/b=host=extra"),
            Err(ConfigError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_empty_broker() {
        assert!(matches!(
            parse_connections("a/b=   "),
            Err(ConfigError::MalformedLine { .. })
        ));
    }

    #[test]
    fn test_component_ids_require_two_segments() {
        let entry = ConnectionEntry {
            topic: "sensors".to_string(),
            broker: "localhost".to_string(),
        };
        assert!(matches!(
            entry.component_ids(),
            Err(ConfigError::InvalidTopic(_))
        ));
    }

    #[test]
    fn test_component_ids_ignore_extra_segments() {
        let entry = ConnectionEntry {
            topic: "light/sensor7/raw".to_string(),
            broker: "localhost".to_string(),
        };
        let (component, id) = entry.component_ids().unwrap();
        assert_eq!(component, "LIGHT");
        assert_eq!(id, "sensor7");
    }

    #[tokio::test]
    async fn test_wait_for_existing_file_returns_immediately() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_tx, rx) = watch::channel(false);

        let result = wait_for_file(file.path(), Duration::from_secs(1), None, rx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.txt");
        let (_tx, rx) = watch::channel(false);

        let result = wait_for_file(
            &path,
            Duration::from_millis(10),
            Some(Duration::from_millis(50)),
            rx,
        )
        .await;
        assert!(matches!(result, Err(ConfigError::WaitTimedOut(_, _))));
    }

    #[tokio::test]
    async fn test_wait_cancelled_by_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.txt");
        let (tx, rx) = watch::channel(false);

        let waiter = tokio::spawn(async move {
            wait_for_file(&path, Duration::from_secs(60), None, rx).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ConfigError::WaitCancelled(_))));
    }
}

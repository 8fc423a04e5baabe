//! "updated" notifications for crawled domains.

use crate::config::Settings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Message sent on a domain's topic after a pass that included it.
pub const UPDATED: &str = "updated";

/// Publish-only messaging seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<()>;
}

/// Publishes over NATS.
///
/// Each event opens its own connection, publishes, flushes and drops the
/// connection, so a broker outage only costs the events sent during it.
/// The whole exchange is bounded by `timeout`.
pub struct NatsNotifier {
    url: String,
    timeout: Duration,
}

impl NatsNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    async fn deliver(&self, topic: &str, message: &str) -> Result<()> {
        let client = async_nats::connect(self.url.as_str())
            .await
            .with_context(|| format!("connecting to {}", self.url))?;
        client
            .publish(topic.to_string(), Bytes::copy_from_slice(message.as_bytes()))
            .await
            .with_context(|| format!("publishing to {}", topic))?;
        client
            .flush()
            .await
            .with_context(|| format!("flushing {}", topic))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        tokio::time::timeout(self.timeout, self.deliver(topic, message))
            .await
            .with_context(|| format!("notifying {} timed out after {:?}", topic, self.timeout))?
    }
}

/// Writes events to the log only. Used when no broker is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        info!("Notify {}: {}", topic, message);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub message: String,
}

/// Keeps every published event in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    published: RwLock<Vec<Published>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records nothing and fails every publish.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published().into_iter().map(|p| p.topic).collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        if self.fail {
            anyhow::bail!("broker unavailable");
        }
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Published {
                topic: topic.to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}

/// NATS when `NATS_URL` is set, log-only otherwise.
pub fn notifier_for(settings: &Settings) -> Arc<dyn Notifier> {
    match &settings.nats_url {
        Some(url) => Arc::new(NatsNotifier::new(url.as_str(), settings.http_timeout)),
        None => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.publish("host-a", UPDATED).await.unwrap();
        notifier.publish("host-b:8080", UPDATED).await.unwrap();

        assert_eq!(notifier.publish_count(), 2);
        assert_eq!(notifier.topics(), vec!["host-a", "host-b:8080"]);
        assert_eq!(notifier.published()[0].message, "updated");
    }

    #[tokio::test]
    async fn test_failing_notifier() {
        let notifier = RecordingNotifier::failing();
        assert!(notifier.publish("host-a", UPDATED).await.is_err());
        assert_eq!(notifier.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.publish("host-a", UPDATED).await.is_ok());
    }

    #[tokio::test]
    async fn test_nats_notifier_unreachable_broker_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = NatsNotifier::new(format!("nats://{}", addr), Duration::from_secs(5));
        assert!(notifier.publish("host-a", UPDATED).await.is_err());
    }

    #[tokio::test]
    async fn test_nats_notifier_silent_broker_times_out() {
        // Accepts the TCP connection but never speaks the protocol.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _held = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let notifier = NatsNotifier::new(format!("nats://{}", addr), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let result = notifier.publish("host-a", UPDATED).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}

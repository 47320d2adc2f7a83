//! Publisher connection with a linger-bounded close.
//!
//! The transport is opened lazily on the first send, so connection errors
//! surface from [`PublisherConnection::send`]. [`PublisherConnection::close`]
//! consumes the connection and waits up to the linger budget for queued data
//! to drain before releasing the transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PublishError;
use crate::message::EncodedMessage;
use crate::transport::{Connector, Transport};

/// Linger used when none is configured.
pub const DEFAULT_LINGER: Duration = Duration::from_millis(2000);

/// Connect budget used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-invocation connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bus endpoint, e.g. `tcp://hub.example.org:9940`
    pub endpoint: String,

    /// How long `close` may wait for queued data to drain
    pub linger: Duration,

    /// How long opening the transport may take
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            linger: DEFAULT_LINGER,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// A logical connection to the bus.
pub struct PublisherConnection {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    sent: u64,
}

impl PublisherConnection {
    /// Prepare a connection. Nothing is opened until the first send.
    pub fn connect(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            transport: None,
            sent: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Messages accepted by the transport so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Queue a message on the transport, opening it if needed.
    pub async fn send(&mut self, message: &EncodedMessage) -> Result<(), PublishError> {
        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => {
                self.connector
                    .connect(&self.config.endpoint, self.config.connect_timeout)
                    .await?
            }
        };

        let result = transport
            .send_frames(&[message.topic.as_bytes(), &message.body])
            .await;
        self.transport = Some(transport);

        if result.is_ok() {
            self.sent += 1;
            debug!(topic = %message.topic, bytes = message.body.len(), "Queued message");
        }
        result
    }

    /// Drain queued data within the linger budget, then release the transport.
    ///
    /// Returns an error if the drain failed or did not finish in time; in
    /// that case queued messages may not have reached the bus.
    pub async fn close(mut self) -> Result<(), PublishError> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        let linger = self.config.linger;

        let drained = tokio::time::timeout(linger, async {
            transport.flush().await?;
            transport.shutdown().await
        })
        .await;

        match drained {
            Ok(Ok(())) => {
                debug!(endpoint = %self.config.endpoint, sent = self.sent, "Connection closed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(endpoint = %self.config.endpoint, error = %e, "Drain failed on close");
                Err(e)
            }
            Err(_) => {
                warn!(
                    endpoint = %self.config.endpoint,
                    linger_ms = linger.as_millis() as u64,
                    "Linger elapsed before queued data drained"
                );
                Err(PublishError::DrainTimeout {
                    linger_ms: linger.as_millis() as u64,
                })
            }
        }
    }
}

/// Open a connection, send one message, and always close it.
///
/// A send failure takes precedence over a close failure.
pub async fn publish_once(
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    message: &EncodedMessage,
) -> Result<(), PublishError> {
    let mut connection = PublisherConnection::connect(config, connector);
    let sent = connection.send(message).await;
    let closed = connection.close().await;
    sent.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingConnector;

    fn encoded(topic: &str) -> EncodedMessage {
        EncodedMessage {
            topic: topic.to_string(),
            body: br#"{"i":1}"#.to_vec(),
        }
    }

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::new("tcp://localhost:9940");
        assert_eq!(config.linger, Duration::from_millis(2000));
        assert_eq!(config.connect_timeout, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let connector = RecordingConnector::new();
        let connection = PublisherConnection::connect(
            ConnectionConfig::new("tcp://localhost:9940"),
            Arc::new(connector.clone()),
        );

        assert_eq!(connector.connect_attempts(), 0);
        connection.close().await.expect("close without send");
        assert_eq!(connector.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_send_then_close_delivers() {
        let connector = RecordingConnector::new();
        let mut connection = PublisherConnection::connect(
            ConnectionConfig::new("tcp://localhost:9940"),
            Arc::new(connector.clone()),
        );

        connection.send(&encoded("a.b")).await.expect("send");
        connection.send(&encoded("a.c")).await.expect("send");
        assert_eq!(connection.sent(), 2);
        assert_eq!(connector.connect_attempts(), 1);

        connection.close().await.expect("close");
        let topics: Vec<String> = connector
            .delivered()
            .into_iter()
            .map(|m| m.topic)
            .collect();
        assert_eq!(topics, vec!["a.b", "a.c"]);
        assert!(connector.was_shut_down());
    }

    #[tokio::test]
    async fn test_publish_once_closes_after_send_failure() {
        let connector = RecordingConnector::new().failing_sends();
        let result = publish_once(
            ConnectionConfig::new("tcp://localhost:9940"),
            Arc::new(connector.clone()),
            &encoded("a.b"),
        )
        .await;

        assert!(matches!(result, Err(PublishError::Io(_))));
        assert_eq!(connector.send_attempts(), 1);
        assert!(connector.was_shut_down());
    }
}

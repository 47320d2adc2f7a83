//! In-memory transport fakes (testing only)
//!
//! `RecordingConnector` hands out transports that record every frame they are
//! given. Frames sit in a pending queue until the transport is flushed, and
//! flushing can be slowed down to exercise the linger budget on close.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::message::EncodedMessage;
use crate::transport::{Connector, Transport};

type Frames = Vec<Vec<u8>>;

#[derive(Debug, Default)]
struct RecordingState {
    connect_attempts: u64,
    send_attempts: u64,
    pending: Vec<Frames>,
    delivered: Vec<Frames>,
    shut_down: bool,
}

/// Connector whose transports record instead of sending.
///
/// Clones share the same recording, so a test can keep one handle and give
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    state: Arc<Mutex<RecordingState>>,
    drain_delay: Duration,
    fail_connects: bool,
    fail_sends: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flushing takes this long before pending frames count as delivered.
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    /// Every connect attempt fails with a refused connection.
    pub fn failing_connects(mut self) -> Self {
        self.fail_connects = true;
        self
    }

    /// Every send fails with a broken pipe.
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts
    }

    pub fn send_attempts(&self) -> u64 {
        self.lock().send_attempts
    }

    /// Messages queued but not yet flushed.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Messages that made it through a flush, in order.
    pub fn delivered(&self) -> Vec<EncodedMessage> {
        self.lock()
            .delivered
            .iter()
            .map(|frames| EncodedMessage {
                topic: frames
                    .first()
                    .map(|t| String::from_utf8_lossy(t).into_owned())
                    .unwrap_or_default(),
                body: frames.get(1).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn was_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Transport>, PublishError> {
        self.lock().connect_attempts += 1;
        if self.fail_connects {
            return Err(PublishError::Connect {
                endpoint: endpoint.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        Ok(Box::new(RecordingTransport {
            connector: self.clone(),
        }))
    }
}

struct RecordingTransport {
    connector: RecordingConnector,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), PublishError> {
        let mut state = self.connector.lock();
        state.send_attempts += 1;
        if self.connector.fail_sends {
            return Err(PublishError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        state.pending.push(frames.iter().map(|f| f.to_vec()).collect());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        if !self.connector.drain_delay.is_zero() {
            tokio::time::sleep(self.connector.drain_delay).await;
        }
        let mut state = self.connector.lock();
        let pending = std::mem::take(&mut state.pending);
        state.delivered.extend(pending);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), PublishError> {
        self.connector.lock().shut_down = true;
        Ok(())
    }
}

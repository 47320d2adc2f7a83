//! Bus transports.
//!
//! A [`Connector`] opens a [`Transport`] for an endpoint. Production traffic
//! goes through a ZeroMQ PUB socket connected to the bus endpoint; each
//! message is the multipart `[topic, json body]` that fedmsg subscribers
//! filter on.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;
use zeromq::{PubSocket, Socket, SocketSend, ZmqError, ZmqMessage};

use crate::error::PublishError;

/// An open, write-only link to the bus.
#[async_trait]
pub trait Transport: Send {
    /// Queue one multi-frame message. Data may stay buffered until `flush`.
    async fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), PublishError>;

    /// Push everything queued so far to the peer.
    async fn flush(&mut self) -> Result<(), PublishError>;

    /// Close the write side.
    async fn shutdown(&mut self) -> Result<(), PublishError>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, PublishError>;
}

/// Host and port from a `tcp://host:port` endpoint.
pub fn parse_tcp_endpoint(endpoint: &str) -> Result<(String, u16), PublishError> {
    let url = Url::parse(endpoint)
        .map_err(|e| PublishError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    if url.scheme() != "tcp" {
        return Err(PublishError::InvalidEndpoint(format!(
            "{endpoint}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| PublishError::InvalidEndpoint(format!("{endpoint}: missing host")))?;
    let port = url
        .port()
        .ok_or_else(|| PublishError::InvalidEndpoint(format!("{endpoint}: missing port")))?;

    // IPv6 literals come back bracketed
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}

/// Connects a ZeroMQ PUB socket, the way fedmsg producers reach the bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqConnector;

#[async_trait]
impl Connector for ZmqConnector {
    async fn connect(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, PublishError> {
        parse_tcp_endpoint(endpoint)?;

        let mut socket = PubSocket::new();
        tokio::time::timeout(timeout, socket.connect(endpoint))
            .await
            .map_err(|_| PublishError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| match e {
                ZmqError::Network(source) => PublishError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                },
                other => PublishError::Socket(other),
            })?;

        debug!(endpoint = %endpoint, "Connected to bus");
        Ok(Box::new(ZmqTransport {
            socket: Some(socket),
        }))
    }
}

/// Multipart `[topic, body]` messages over a PUB socket.
pub struct ZmqTransport {
    socket: Option<PubSocket>,
}

fn socket_error(e: ZmqError) -> PublishError {
    match e {
        ZmqError::Network(source) => PublishError::Io(source),
        other => PublishError::Socket(other),
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), PublishError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(PublishError::Socket(ZmqError::Socket("socket already closed")))?;
        let Some((first, rest)) = frames.split_first() else {
            return Ok(());
        };

        let mut message = ZmqMessage::from(first.to_vec());
        for frame in rest {
            message.push_back(frame.to_vec().into());
        }
        socket.send(message).await.map_err(socket_error)
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        // send() hands frames straight to the peer connections
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), PublishError> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };
        match socket.close().await.into_iter().next() {
            Some(e) => Err(socket_error(e)),
            None => Ok(()),
        }
    }
}

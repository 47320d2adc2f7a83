//! fedmsg emitter
//!
//! Publishes one message to a fedmsg bus when a build finishes:
//! - `status`: build outcome to status keyword (`passed`, `failed`, ...)
//! - `message`: the `{topic, msg, timestamp, i}` envelope
//! - `signer`: Ed25519 signing against an X.509 certificate
//! - `connection` / `transport`: lazy ZeroMQ connection with linger-bounded close
//! - `pipeline`: the short-circuiting orchestration hosts call into
//!
//! Hosts build a [`PipelineConfig`], wrap it in a [`Pipeline`], and call
//! [`Pipeline::emit`] once per finished build.

pub mod config;
pub mod connection;
pub mod error;
pub mod fakes;
pub mod message;
pub mod obs;
pub mod pipeline;
pub mod signer;
pub mod status;
pub mod telemetry;
pub mod transport;

pub use config::{PipelineConfig, DEFAULT_TOPIC_PREFIX};
pub use connection::{publish_once, ConnectionConfig, PublisherConnection};
pub use error::{ConfigError, EmitError, PublishError, Result, SigningError, Stage};
pub use message::{
    BuildContext, BuildPayload, EncodedMessage, Message, Outbound, CONFIGURATION_DELIMITER,
    MESSAGE_SCHEMA_VERSION,
};
pub use pipeline::{EmitOutcome, Pipeline};
pub use signer::{sign, verify, verify_wire, CertificateRef, SignedMessage, Signer};
pub use status::{map_status, BuildOutcome};
pub use telemetry::init_tracing;
pub use transport::{Connector, Transport, ZmqConnector};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

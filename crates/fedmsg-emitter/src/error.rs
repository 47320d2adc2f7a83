//! Error types for the emit pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage names, used to tag failures in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sign,
    Serialize,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Sign => "sign",
            Stage::Serialize => "serialize",
            Stage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while loading signing material or signing a message
#[derive(Error, Debug)]
pub enum SigningError {
    /// Certificate file missing, unreadable, or without a PEM certificate
    #[error("Failed to read certificate {path}: {reason}")]
    CertificateRead { path: PathBuf, reason: String },

    /// Key file missing, unreadable, or without a PKCS#8 PEM key
    #[error("Failed to read private key {path}: {reason}")]
    KeyRead { path: PathBuf, reason: String },

    /// Certificate bytes could not be parsed as X.509
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Key bytes are not a usable Ed25519 key
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Private key does not belong to the certificate
    #[error("Private key does not match certificate {fingerprint}")]
    KeyMismatch { fingerprint: String },

    /// Message could not be put into canonical form
    #[error("Failed to canonicalize message: {0}")]
    Canonicalization(#[from] serde_json::Error),

    /// Signing requested without a certificate or key path
    #[error("Signing enabled but no {0} configured")]
    MissingMaterial(&'static str),

    /// Signature does not verify against the certificate
    #[error("Signature verification failed: {0}")]
    BadSignature(String),
}

/// Errors raised by the bus connection
#[derive(Error, Debug)]
pub enum PublishError {
    /// Endpoint is not a usable `tcp://host:port` URI
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport could not be established
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport did not come up within the connection budget
    #[error("Timed out connecting to {endpoint} after {timeout_ms}ms")]
    ConnectTimeout { endpoint: String, timeout_ms: u64 },

    /// ZeroMQ socket failure other than a network error
    #[error("Bus socket error: {0}")]
    Socket(#[from] zeromq::ZmqError),

    /// Write failed on an established transport
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Queued data was still pending when the linger budget ran out
    #[error("Linger of {linger_ms}ms elapsed before queued data drained")]
    DrainTimeout { linger_ms: u64 },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Terminal failure of one pipeline invocation
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl EmitError {
    /// Stage that produced this failure.
    pub fn stage(&self) -> Stage {
        match self {
            EmitError::Serialization(_) => Stage::Serialize,
            EmitError::Signing(_) => Stage::Sign,
            EmitError::Publish(_) => Stage::Publish,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, EmitError>;

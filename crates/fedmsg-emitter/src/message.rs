//! Message envelope for build notifications.
//!
//! The envelope mirrors the fedmsg wire schema:
//!
//! ```text
//! { "topic": "<prefix>.<env>.jenkins.build.<status>",
//!   "msg": { "project": "...", "build": 42, "configuration"?: "..." },
//!   "timestamp": <epoch seconds>,
//!   "i": 1 }
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signer::SignedMessage;
use crate::status::BuildOutcome;

/// Separator between a project and its sub-configuration in hierarchical names.
pub const CONFIGURATION_DELIMITER: &str = " » ";

/// Envelope schema version carried in the `i` field.
pub const MESSAGE_SCHEMA_VERSION: u32 = 1;

/// Topic segment between the environment and the status.
pub const TOPIC_CATEGORY: &str = "jenkins.build";

/// What the host knows about a build when it asks us to report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Full project name, possibly `"<project> » <configuration>"`.
    pub project: String,

    /// Build number.
    pub number: u64,

    /// Terminal outcome, `None` while the build is still running.
    pub outcome: Option<BuildOutcome>,
}

impl BuildContext {
    pub fn new(project: impl Into<String>, number: u64, outcome: Option<BuildOutcome>) -> Self {
        Self {
            project: project.into(),
            number,
            outcome,
        }
    }
}

/// Body of a build message (`msg` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPayload {
    pub project: String,
    pub build: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

impl BuildPayload {
    /// Split a hierarchical project identity on the first delimiter.
    pub fn from_identity(identity: &str, build: u64) -> Self {
        match identity.split_once(CONFIGURATION_DELIMITER) {
            Some((project, configuration)) => Self {
                project: project.to_string(),
                build,
                configuration: Some(configuration.to_string()),
            },
            None => Self {
                project: identity.to_string(),
                build,
                configuration: None,
            },
        }
    }
}

/// An unsigned build message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    topic: String,
    msg: BuildPayload,
    timestamp: i64,
    i: u32,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn build(
        project_identity: &str,
        build_number: u64,
        status: &str,
        topic_prefix: &str,
        environment: &str,
        sequence: u32,
    ) -> Self {
        Self::build_at(
            project_identity,
            build_number,
            status,
            topic_prefix,
            environment,
            sequence,
            Utc::now().timestamp(),
        )
    }

    /// Build a message with an explicit epoch-seconds timestamp.
    pub fn build_at(
        project_identity: &str,
        build_number: u64,
        status: &str,
        topic_prefix: &str,
        environment: &str,
        sequence: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            topic: build_topic(topic_prefix, environment, status),
            msg: BuildPayload::from_identity(project_identity, build_number),
            timestamp,
            i: sequence,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &BuildPayload {
        &self.msg
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn sequence(&self) -> u32 {
        self.i
    }

    /// Canonical JSON: sorted keys, no whitespace. This is what gets signed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        // Value objects are BTreeMap-backed, so keys come out sorted.
        let value = serde_json::to_value(self)?;
        serde_json::to_vec(&value)
    }
}

/// `<prefix>.<environment>.jenkins.build.<status>`
pub fn build_topic(topic_prefix: &str, environment: &str, status: &str) -> String {
    format!("{topic_prefix}.{environment}.{TOPIC_CATEGORY}.{status}")
}

/// What the publish stage puts on the bus.
#[derive(Debug, Clone)]
pub enum Outbound {
    Unsigned(Message),
    Signed(SignedMessage),
}

impl Outbound {
    pub fn message(&self) -> &Message {
        match self {
            Outbound::Unsigned(message) => message,
            Outbound::Signed(signed) => &signed.message,
        }
    }

    pub fn topic(&self) -> &str {
        self.message().topic()
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Outbound::Signed(_))
    }

    /// JSON object sent as the message body.
    pub fn to_wire(&self) -> Result<Value, serde_json::Error> {
        match self {
            Outbound::Unsigned(message) => serde_json::to_value(message),
            Outbound::Signed(signed) => {
                let mut value = serde_json::to_value(&signed.message)?;
                if let Value::Object(map) = &mut value {
                    map.insert(
                        "signature".to_string(),
                        Value::String(BASE64.encode(&signed.signature)),
                    );
                    map.insert(
                        "certificate".to_string(),
                        Value::String(BASE64.encode(signed.certificate.pem().as_bytes())),
                    );
                }
                Ok(value)
            }
        }
    }

    /// Serialize into the frames handed to the transport.
    pub fn encode(&self) -> Result<EncodedMessage, serde_json::Error> {
        let body = serde_json::to_vec(&self.to_wire()?)?;
        Ok(EncodedMessage {
            topic: self.topic().to_string(),
            body,
        })
    }
}

/// Serialized message: topic frame plus JSON body frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub topic: String,
    pub body: Vec<u8>,
}

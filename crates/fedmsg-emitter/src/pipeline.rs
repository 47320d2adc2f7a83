//! Build outcome to bus message pipeline.
//!
//! One invocation walks the stages in order and stops at the first failure:
//!
//! 1. fetch outcome: no terminal outcome means nothing to report
//! 2. map status and build the message (cannot fail)
//! 3. sign, if configured; a signing failure never falls back to unsigned
//! 4. serialize to the wire format
//! 5. publish over a fresh connection that is closed on every path
//!
//! Failures are logged with their stage and returned as [`EmitError`];
//! [`Pipeline::emit`] folds the result into the `bool` hosts expect.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::connection::publish_once;
use crate::error::{ConfigError, EmitError, SigningError};
use crate::message::{BuildContext, Message, Outbound, MESSAGE_SCHEMA_VERSION};
use crate::obs;
use crate::signer::{self, SignedMessage};
use crate::transport::{Connector, ZmqConnector};

/// How an invocation ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Message handed to the bus and drained within the linger budget.
    Sent { topic: String, signed: bool },

    /// Build had no terminal outcome; nothing was sent.
    NoResult,
}

/// Emits one bus message per finished build.
pub struct Pipeline {
    config: PipelineConfig,
    connector: Arc<dyn Connector>,
}

impl Pipeline {
    /// Validates `config` up front so every message carries a well-formed topic.
    pub fn new(
        config: PipelineConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, connector })
    }

    /// Pipeline publishing through a ZeroMQ PUB socket.
    pub fn zmq(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(ZmqConnector))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Report a build. `true` when the message was sent or there was nothing to send.
    pub async fn emit(&self, build: &BuildContext) -> bool {
        self.run(build).await.is_ok()
    }

    /// Report a build and return the detailed outcome.
    pub async fn run(&self, build: &BuildContext) -> Result<EmitOutcome, EmitError> {
        let span = obs::emit_span(&build.project, build.number);
        async {
            let result = self.run_stages(build).await;
            if let Err(e) = &result {
                obs::emit_failed(e);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// The message that would be sent for `build`, if it has an outcome.
    pub fn preview(&self, build: &BuildContext) -> Option<Message> {
        build
            .outcome
            .as_ref()
            .map(|outcome| self.build_message(build, outcome.status()))
    }

    async fn run_stages(&self, build: &BuildContext) -> Result<EmitOutcome, EmitError> {
        let Some(outcome) = build.outcome.as_ref() else {
            obs::emit_skipped();
            return Ok(EmitOutcome::NoResult);
        };

        let status = outcome.status();
        obs::emit_started(status, self.config.should_sign);

        let message = self.build_message(build, status);
        let outbound = if self.config.should_sign {
            Outbound::Signed(self.sign(message)?)
        } else {
            Outbound::Unsigned(message)
        };
        let encoded = outbound.encode()?;

        publish_once(
            self.config.connection_config(),
            Arc::clone(&self.connector),
            &encoded,
        )
        .await?;

        obs::emit_sent(&encoded.topic, &self.config.endpoint, outbound.is_signed());
        Ok(EmitOutcome::Sent {
            topic: encoded.topic,
            signed: outbound.is_signed(),
        })
    }

    fn build_message(&self, build: &BuildContext, status: &str) -> Message {
        Message::build(
            &build.project,
            build.number,
            status,
            self.config.topic_prefix(),
            &self.config.environment_shortname,
            MESSAGE_SCHEMA_VERSION,
        )
    }

    fn sign(&self, message: Message) -> Result<SignedMessage, SigningError> {
        let certificate = self
            .config
            .certificate_file
            .as_ref()
            .ok_or(SigningError::MissingMaterial("certificate_file"))?;
        let key = self
            .config
            .keystore_file
            .as_ref()
            .ok_or(SigningError::MissingMaterial("keystore_file"))?;
        signer::sign(message, certificate, key)
    }
}

//! Structured log events for the emit lifecycle.
//!
//! Every invocation runs inside an `fedmsg.emit` span carrying a fresh
//! invocation id plus the project and build number, so all lines from one
//! build can be grouped. Events are emitted with an `event` field:
//! `emit.started`, `emit.skipped`, `emit.sent`, `emit.failed`.

use tracing::{error, info};
use uuid::Uuid;

use crate::error::{EmitError, Stage};

/// Span for one pipeline invocation.
pub fn emit_span(project: &str, number: u64) -> tracing::Span {
    tracing::info_span!(
        "fedmsg.emit",
        invocation_id = %Uuid::new_v4(),
        project = %project,
        build = number,
    )
}

pub fn emit_started(status: &str, signed: bool) {
    info!(event = "emit.started", status = %status, signed = signed);
}

/// Build has no terminal outcome; nothing is sent.
pub fn emit_skipped() {
    info!(event = "emit.skipped", "Build has no result yet, nothing to report");
}

pub fn emit_sent(topic: &str, endpoint: &str, signed: bool) {
    info!(event = "emit.sent", topic = %topic, endpoint = %endpoint, signed = signed);
}

pub fn emit_failed(error: &EmitError) {
    let stage: Stage = error.stage();
    error!(event = "emit.failed", stage = %stage, error = %error);
}

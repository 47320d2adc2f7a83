//! Build outcomes and the status keywords used in topic names.

use serde::{Deserialize, Serialize};

/// Result of a finished build, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Success,
    Failure,
    Aborted,
    NotBuilt,
    Unstable,
    /// Any token the host reports that we don't recognize.
    Unknown(String),
}

impl BuildOutcome {
    /// Parse a host result token (`SUCCESS`, `NOT_BUILT`, ...).
    ///
    /// Never fails: unrecognized tokens become [`BuildOutcome::Unknown`].
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => BuildOutcome::Success,
            "FAILURE" => BuildOutcome::Failure,
            "ABORTED" => BuildOutcome::Aborted,
            "NOT_BUILT" => BuildOutcome::NotBuilt,
            "UNSTABLE" => BuildOutcome::Unstable,
            _ => BuildOutcome::Unknown(token.trim().to_string()),
        }
    }

    /// Lowercase status keyword for topics.
    pub fn status(&self) -> &'static str {
        match self {
            BuildOutcome::Success => "passed",
            BuildOutcome::Failure => "failed",
            BuildOutcome::Aborted => "aborted",
            BuildOutcome::NotBuilt => "notbuilt",
            BuildOutcome::Unstable => "unstable",
            BuildOutcome::Unknown(_) => UNKNOWN_STATUS,
        }
    }
}

/// Keyword used when the outcome is absent or unrecognized.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Map an optional outcome to its status keyword.
pub fn map_status(outcome: Option<&BuildOutcome>) -> &'static str {
    outcome.map(BuildOutcome::status).unwrap_or(UNKNOWN_STATUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(BuildOutcome::Success.status(), "passed");
        assert_eq!(BuildOutcome::Failure.status(), "failed");
        assert_eq!(BuildOutcome::Aborted.status(), "aborted");
        assert_eq!(BuildOutcome::NotBuilt.status(), "notbuilt");
        assert_eq!(BuildOutcome::Unstable.status(), "unstable");
    }

    #[test]
    fn test_unknown_outcomes_degrade() {
        assert_eq!(BuildOutcome::Unknown("CANCELLED".to_string()).status(), "unknown");
        assert_eq!(map_status(None), "unknown");
        assert_eq!(map_status(Some(&BuildOutcome::Failure)), "failed");
    }

    #[test]
    fn test_parse_host_tokens() {
        assert_eq!(BuildOutcome::parse("SUCCESS"), BuildOutcome::Success);
        assert_eq!(BuildOutcome::parse("failure"), BuildOutcome::Failure);
        assert_eq!(BuildOutcome::parse(" ABORTED "), BuildOutcome::Aborted);
        assert_eq!(BuildOutcome::parse("NOT_BUILT"), BuildOutcome::NotBuilt);
        assert_eq!(BuildOutcome::parse("Unstable"), BuildOutcome::Unstable);
        assert_eq!(
            BuildOutcome::parse("weird"),
            BuildOutcome::Unknown("weird".to_string())
        );
    }
}

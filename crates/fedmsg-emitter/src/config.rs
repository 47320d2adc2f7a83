//! Pipeline configuration.
//!
//! Loaded from TOML, optionally overridden from `FEDMSG_*` environment
//! variables, then handed to the pipeline as an immutable snapshot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;
use crate::error::ConfigError;

/// Topic prefix used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "org.fedoraproject";

/// Default linger in milliseconds.
pub const DEFAULT_LINGER_MS: u64 = 2000;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Settings read by every pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bus endpoint, `tcp://host:port`
    pub endpoint: String,

    /// First topic segment(s); blank means [`DEFAULT_TOPIC_PREFIX`]
    pub topic_prefix: String,

    /// Deployment tier in the topic (prod, stg, dev)
    pub environment_shortname: String,

    /// Sign messages before sending
    pub should_sign: bool,

    /// PEM certificate used for signing
    pub certificate_file: Option<PathBuf>,

    /// PEM PKCS#8 private key matching the certificate
    pub keystore_file: Option<PathBuf>,

    /// Close drain budget
    pub linger_ms: u64,

    /// Transport connect budget
    pub connect_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            endpoint: String::new(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            environment_shortname: String::new(),
            should_sign: false,
            certificate_file: None,
            keystore_file: None,
            linger_ms: DEFAULT_LINGER_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl PipelineConfig {
    /// Minimal config for an endpoint and environment.
    pub fn new(endpoint: &str, environment: &str) -> Self {
        PipelineConfig {
            endpoint: endpoint.to_string(),
            environment_shortname: environment.to_string(),
            ..Self::default()
        }
    }

    /// Enable signing with the given certificate and key.
    pub fn with_signing(mut self, certificate: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.should_sign = true;
        self.certificate_file = Some(certificate.into());
        self.keystore_file = Some(key.into());
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `FEDMSG_*` overrides using `lookup` to resolve variable names.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FEDMSG_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("FEDMSG_TOPIC_PREFIX") {
            self.topic_prefix = v;
        }
        if let Some(v) = lookup("FEDMSG_ENVIRONMENT") {
            self.environment_shortname = v;
        }
        if let Some(v) = lookup("FEDMSG_SIGN") {
            self.should_sign = parse_bool("FEDMSG_SIGN", &v)?;
        }
        if let Some(v) = lookup("FEDMSG_CERTIFICATE") {
            self.certificate_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FEDMSG_KEYSTORE") {
            self.keystore_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FEDMSG_LINGER_MS") {
            self.linger_ms = parse_u64("FEDMSG_LINGER_MS", &v)?;
        }
        if let Some(v) = lookup("FEDMSG_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse_u64("FEDMSG_CONNECT_TIMEOUT_MS", &v)?;
        }
        Ok(self)
    }

    /// Check that the settings can drive a pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if self.environment_shortname.trim().is_empty() {
            return Err(ConfigError::Missing("environment_shortname"));
        }
        if self.should_sign {
            if self.certificate_file.is_none() {
                return Err(ConfigError::Missing("certificate_file"));
            }
            if self.keystore_file.is_none() {
                return Err(ConfigError::Missing("keystore_file"));
            }
        }
        Ok(())
    }

    /// Effective topic prefix.
    pub fn topic_prefix(&self) -> &str {
        let prefix = self.topic_prefix.trim();
        if prefix.is_empty() {
            DEFAULT_TOPIC_PREFIX
        } else {
            prefix
        }
    }

    /// Connection snapshot for one invocation.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.endpoint.clone())
            .with_linger(Duration::from_millis(self.linger_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.topic_prefix(), "org.fedoraproject");
        assert_eq!(config.linger_ms, 2000);
        assert!(!config.should_sign);
    }

    #[test]
    fn test_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            endpoint = "tcp://hub.fedoraproject.org:9940"
            environment_shortname = "stg"
            should_sign = true
            certificate_file = "/etc/pki/fedmsg/jenkins.crt"
            keystore_file = "/etc/pki/fedmsg/jenkins.key"
            linger_ms = 500
            "#,
        )
        .expect("parse");

        assert_eq!(config.endpoint, "tcp://hub.fedoraproject.org:9940");
        assert_eq!(config.environment_shortname, "stg");
        assert_eq!(config.topic_prefix(), DEFAULT_TOPIC_PREFIX);
        assert_eq!(
            config.certificate_file.as_deref(),
            Some(Path::new("/etc/pki/fedmsg/jenkins.crt"))
        );
        assert_eq!(config.connection_config().linger, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_toml() {
        let err = PipelineConfig::from_toml_str("linger_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_blank_prefix_falls_back() {
        let mut config = PipelineConfig::new("tcp://localhost:9940", "dev");
        config.topic_prefix = "  ".to_string();
        assert_eq!(config.topic_prefix(), "org.fedoraproject");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FEDMSG_ENDPOINT", "tcp://relay:3999"),
            ("FEDMSG_ENVIRONMENT", "prod"),
            ("FEDMSG_SIGN", "yes"),
            ("FEDMSG_CERTIFICATE", "/tmp/c.pem"),
            ("FEDMSG_KEYSTORE", "/tmp/k.pem"),
            ("FEDMSG_LINGER_MS", "250"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .expect("overrides");

        assert_eq!(config.endpoint, "tcp://relay:3999");
        assert_eq!(config.environment_shortname, "prod");
        assert!(config.should_sign);
        assert_eq!(config.linger_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_value() {
        let err = PipelineConfig::default()
            .apply_overrides(|k| (k == "FEDMSG_SIGN").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validate_missing_fields() {
        assert!(matches!(
            PipelineConfig::default().validate(),
            Err(ConfigError::Missing("endpoint"))
        ));
        assert!(matches!(
            PipelineConfig::new("tcp://localhost:9940", "").validate(),
            Err(ConfigError::Missing("environment_shortname"))
        ));

        let mut signing = PipelineConfig::new("tcp://localhost:9940", "dev");
        signing.should_sign = true;
        assert!(matches!(
            signing.validate(),
            Err(ConfigError::Missing("certificate_file"))
        ));
    }
}

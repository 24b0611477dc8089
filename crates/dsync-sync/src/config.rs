//! Synchronizer configuration.
//!
//! The four connection fields (`addr`, `base_dn`, `username`, `password`)
//! sit at the top level. Optional `[retry]`, `[schema]` and `[compiler]`
//! tables fill in from defaults.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dsync_directory::ConnectionConfig;
use dsync_policy::CompilerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub schema: RecordSchema,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl SyncConfig {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            retry: RetryPolicy::default(),
            schema: RecordSchema::default(),
            compiler: CompilerConfig::default(),
        }
    }

    /// Parse JSON (input starting with `{`) or TOML, then validate.
    pub fn from_slice(raw: &[u8]) -> SyncResult<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| SyncError::Config(format!("configuration is not UTF-8: {e}")))?;
        let config: Self = if text.trim_start().starts_with('{') {
            serde_json::from_str(text).map_err(|e| SyncError::Config(e.to_string()))?
        } else {
            toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        self.connection
            .validate()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        self.retry.validate()?;
        self.schema.validate()
    }
}

/// Fixed-interval retry for the initial connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Pause between attempts, in seconds. Fractions are allowed.
    pub interval_secs: f64,
    /// Give up after this many attempts. Unbounded when absent.
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_secs: 5.0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_secs: interval.as_secs_f64(),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or_default()
    }

    fn validate(&self) -> SyncResult<()> {
        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(SyncError::Config(format!(
                "retry.interval_secs must be a non-negative number, got {}",
                self.interval_secs
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(SyncError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Object classes and attribute names of synchronized records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSchema {
    pub document_class: String,
    pub document_path_attr: String,
    pub document_content_attr: String,
    pub policy_class: String,
    pub policy_id_attr: String,
    pub policy_content_attr: String,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            document_class: "OPAData".into(),
            document_path_attr: "path".into(),
            document_content_attr: "jsonData".into(),
            policy_class: "OPAPolicy".into(),
            policy_id_attr: "id".into(),
            policy_content_attr: "content".into(),
        }
    }
}

impl RecordSchema {
    fn validate(&self) -> SyncResult<()> {
        let fields = [
            ("document_class", &self.document_class),
            ("document_path_attr", &self.document_path_attr),
            ("document_content_attr", &self.document_content_attr),
            ("policy_class", &self.policy_class),
            ("policy_id_attr", &self.policy_id_attr),
            ("policy_content_attr", &self.policy_content_attr),
        ];
        match fields.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((name, _)) => Err(SyncError::Config(format!(
                "schema.{name} must not be empty"
            ))),
            None => Ok(()),
        }
    }
}

/// Holds the current configuration. Readers take a snapshot; the lock is
/// held only for the read or the replace.
#[derive(Debug)]
pub struct ConfigCell {
    inner: RwLock<Arc<SyncConfig>>,
}

impl ConfigCell {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<SyncConfig> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in `config`, returning the previous one.
    pub fn replace(&self, config: SyncConfig) -> Arc<SyncConfig> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "addr": "ldap.example.com:389",
        "base_dn": "dc=example,dc=com",
        "username": "cn=admin,dc=example,dc=com",
        "password": "secret"
    }"#;

    #[test]
    fn json_with_defaults() {
        let config = SyncConfig::from_slice(JSON.as_bytes()).unwrap();
        assert_eq!(config.connection.address, "ldap.example.com:389");
        assert_eq!(config.retry.interval(), Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.schema.document_class, "OPAData");
        assert_eq!(config.schema.policy_content_attr, "content");
        assert!(config.compiler.check_path_conflicts);
    }

    #[test]
    fn toml_with_sections() {
        let raw = r#"
address = "ldap.example.com:389"
base-distinguished-name = "dc=example,dc=com"
username = "admin"
password = "secret"

[retry]
interval_secs = 0.5
max_attempts = 3

[schema]
document_class = "policyData"
"#;
        let config = SyncConfig::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(config.connection.base_dn, "dc=example,dc=com");
        assert_eq!(config.retry.interval(), Duration::from_millis(500));
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(config.schema.document_class, "policyData");
        assert_eq!(config.schema.document_path_attr, "path");
    }

    #[test]
    fn missing_or_empty_fields_rejected() {
        let err = SyncConfig::from_slice(br#"{"addr": "h:389"}"#).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);

        let err = SyncConfig::from_slice(
            br#"{"addr": "h:389", "base_dn": "", "username": "u", "password": "p"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_dn"));
    }

    #[test]
    fn retry_bounds_validated() {
        let mut config = SyncConfig::from_slice(JSON.as_bytes()).unwrap();
        config.retry.max_attempts = Some(0);
        assert!(config.validate().is_err());
        config.retry = RetryPolicy {
            interval_secs: -1.0,
            max_attempts: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_hides_password() {
        let config = SyncConfig::from_slice(JSON.as_bytes()).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn cell_replace_and_snapshot() {
        let config = SyncConfig::from_slice(JSON.as_bytes()).unwrap();
        let cell = ConfigCell::new(config.clone());
        let before = cell.snapshot();

        let mut next = config;
        next.connection.address = "other:389".into();
        let old = cell.replace(next);

        assert_eq!(old.connection.address, "ldap.example.com:389");
        assert_eq!(before.connection.address, "ldap.example.com:389");
        assert_eq!(cell.snapshot().connection.address, "other:389");
    }
}

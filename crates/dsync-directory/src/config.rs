use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Parameters for one directory session.
///
/// Accepts `addr` and `base-distinguished-name` as aliases so existing
/// plugin configuration keeps working. `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `host:port`, or a full `ldap://` / `ldaps://` URL.
    #[serde(alias = "addr")]
    pub address: String,
    #[serde(alias = "base-distinguished-name")]
    pub base_dn: String,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn new(
        address: impl Into<String>,
        base_dn: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            base_dn: base_dn.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Every field must be non-empty.
    pub fn validate(&self) -> DirectoryResult<()> {
        let fields = [
            ("address", &self.address),
            ("base_dn", &self.base_dn),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(DirectoryError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// LDAP URL for the address. A bare `host:port` becomes `ldap://host:port`.
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("ldap://{}", self.address)
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("base_dn", &self.base_dn)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionConfig {
        ConnectionConfig::new(
            "ldap.example.com:389",
            "dc=example,dc=com",
            "cn=admin,dc=example,dc=com",
            "s3cret",
        )
    }

    #[test]
    fn debug_redacts_password() {
        let text = format!("{:?}", sample());
        assert!(text.contains("ldap.example.com:389"));
        assert!(!text.contains("s3cret"));
        assert!(text.contains("[REDACTED]"));
    }

    #[test]
    fn url_from_address() {
        assert_eq!(sample().url(), "ldap://ldap.example.com:389");
        let mut config = sample();
        config.address = "ldaps://ldap.example.com:636".into();
        assert_eq!(config.url(), "ldaps://ldap.example.com:636");
    }

    #[test]
    fn validate_rejects_empty_fields() {
        assert!(sample().validate().is_ok());
        let mut config = sample();
        config.base_dn = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_dn"));
    }

    #[test]
    fn accepts_legacy_field_names() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"addr": "h:389", "base-distinguished-name": "dc=x", "username": "u", "password": "p"}"#,
        )
        .unwrap();
        assert_eq!(config.address, "h:389");
        assert_eq!(config.base_dn, "dc=x");

        let config: ConnectionConfig = toml::from_str(
            "address = \"h:389\"\nbase_dn = \"dc=x\"\nusername = \"u\"\npassword = \"p\"\n",
        )
        .unwrap();
        assert_eq!(config.address, "h:389");
    }
}

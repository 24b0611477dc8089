//! LDAP implementation of the directory traits, built on `ldap3`.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry, SearchOptions};
use tracing::{debug, warn};

use crate::client::{Connector, DirectoryClient};
use crate::config::ConnectionConfig;
use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::search::SearchRequest;

/// Dials an LDAP server, upgrades the connection with StartTLS and performs
/// a simple bind.
///
/// Certificate verification is off unless enabled with
/// [`Self::with_tls_verification`].
#[derive(Clone, Debug)]
pub struct LdapConnector {
    conn_timeout: Duration,
    starttls: bool,
    verify_tls: bool,
}

impl Default for LdapConnector {
    fn default() -> Self {
        Self {
            conn_timeout: Duration::from_secs(30),
            starttls: true,
            verify_tls: false,
        }
    }
}

impl LdapConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = timeout;
        self
    }

    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Skip the StartTLS upgrade. Meant for `ldaps://` URLs, where the
    /// session is already encrypted.
    pub fn without_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    fn settings(&self, url: &str) -> LdapConnSettings {
        // StartTLS on an ldaps:// URL is a protocol error.
        let starttls = self.starttls && !url.starts_with("ldaps://");
        LdapConnSettings::new()
            .set_conn_timeout(self.conn_timeout)
            .set_starttls(starttls)
            .set_no_tls_verify(!self.verify_tls)
    }
}

#[async_trait]
impl Connector for LdapConnector {
    type Client = LdapClient;

    async fn connect(&self, config: &ConnectionConfig) -> DirectoryResult<LdapClient> {
        config.validate()?;
        let url = config.url();
        debug!(url = %url, "connecting to directory");

        let (conn, mut ldap) = LdapConnAsync::with_settings(self.settings(&url), &url)
            .await
            .map_err(|e| DirectoryError::connection(format!("{url}: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver error");
            }
        });

        debug!(bind_dn = %config.username, "binding to directory");
        let bound = ldap
            .simple_bind(&config.username, &config.password)
            .await
            .map_err(|e| DirectoryError::connection(format!("bind request failed: {e}")))
            .and_then(|res| {
                res.success()
                    .map(|_| ())
                    .map_err(|e| DirectoryError::Bind(e.to_string()))
            });
        if let Err(e) = bound {
            // Leave nothing open on a failed attempt.
            if let Err(unbind) = ldap.unbind().await {
                debug!(error = %unbind, "unbind after failed bind");
            }
            return Err(e);
        }

        Ok(LdapClient {
            ldap,
            url,
            closed: false,
        })
    }
}

/// An authenticated LDAP session.
pub struct LdapClient {
    ldap: Ldap,
    url: String,
    closed: bool,
}

impl LdapClient {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        if self.closed {
            return Err(DirectoryError::Closed);
        }
        let filter = request.filter.to_string();
        debug!(base = %request.base, filter = %filter, "directory search");

        let (entries, _) = self
            .ldap
            .with_search_options(SearchOptions::new().deref(request.deref.to_ldap3()))
            .search(
                &request.base,
                request.scope.to_ldap3(),
                &filter,
                request.attrs.clone(),
            )
            .await
            .map_err(|e| DirectoryError::search(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::search(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.ldap.unbind().await?;
        debug!(url = %self.url, "directory connection closed");
        Ok(())
    }
}

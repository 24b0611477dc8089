//! Host lifecycle shim.
//!
//! A host creates plugins through a [`PluginFactory`] after validating the
//! raw configuration, then drives them with `start`, `reconfigure` and
//! `stop`. [`SynchronizerFactory`] wires a [`Synchronizer`] into that
//! lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use dsync_directory::Connector;
use dsync_store::TransactionalStore;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::synchronizer::Synchronizer;

/// Name the directory sync plugin registers under.
pub const PLUGIN_NAME: &str = "init_ldap_datas";

/// What the host hands to every lifecycle call.
#[derive(Clone, Debug, Default)]
pub struct PluginContext {
    /// Fires when the host shuts down.
    pub cancel: CancellationToken,
}

impl PluginContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Blocks until the plugin is ready or has failed.
    async fn start(&self, ctx: &PluginContext) -> SyncResult<()>;

    async fn stop(&self, ctx: &PluginContext);

    /// Swap in a new, already validated configuration.
    fn reconfigure(&self, ctx: &PluginContext, config: SyncConfig) -> SyncResult<()>;
}

pub trait PluginFactory: Send + Sync {
    type Plugin: Plugin;

    /// Decode and check a raw configuration (JSON or TOML).
    fn validate(&self, raw: &[u8]) -> SyncResult<SyncConfig>;

    fn create(&self, config: SyncConfig) -> SyncResult<Self::Plugin>;
}

#[async_trait]
impl<C, S> Plugin for Synchronizer<C, S>
where
    C: Connector,
    S: TransactionalStore,
{
    async fn start(&self, ctx: &PluginContext) -> SyncResult<()> {
        Synchronizer::start(self, &ctx.cancel).await.map(|_| ())
    }

    async fn stop(&self, _ctx: &PluginContext) {
        Synchronizer::stop(self).await;
    }

    fn reconfigure(&self, _ctx: &PluginContext, config: SyncConfig) -> SyncResult<()> {
        Synchronizer::reconfigure(self, config)
    }
}

/// Builds synchronizers sharing one connector and one store.
pub struct SynchronizerFactory<C, S> {
    connector: C,
    store: Arc<S>,
}

impl<C, S> SynchronizerFactory<C, S> {
    pub fn new(connector: C, store: Arc<S>) -> Self {
        Self { connector, store }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }
}

impl<C, S> PluginFactory for SynchronizerFactory<C, S>
where
    C: Connector + Clone,
    S: TransactionalStore,
{
    type Plugin = Synchronizer<C, S>;

    fn validate(&self, raw: &[u8]) -> SyncResult<SyncConfig> {
        SyncConfig::from_slice(raw)
    }

    fn create(&self, config: SyncConfig) -> SyncResult<Self::Plugin> {
        Synchronizer::new(config, self.connector.clone(), Arc::clone(&self.store))
    }
}

#[cfg(test)]
mod tests {
    use dsync_directory::{DirectoryEntry, InMemoryConnector, InMemoryDirectory};
    use dsync_store::{InMemoryStore, StorePath, Transaction, TxnMode};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::types::SyncState;

    const RAW: &str = r#"{"addr": "mem:389", "base_dn": "dc=example,dc=com",
        "username": "admin", "password": "secret", "retry": {"interval_secs": 0.005}}"#;

    fn factory(entries: Vec<DirectoryEntry>) -> SynchronizerFactory<InMemoryConnector, InMemoryStore> {
        let directory = Arc::new(InMemoryDirectory::with_entries(entries));
        SynchronizerFactory::new(InMemoryConnector::new(directory), Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn lifecycle() {
        let factory = factory(vec![DirectoryEntry::new("cn=d,dc=example,dc=com")
            .with_attr("objectClass", "OPAData")
            .with_attr("path", "/team/owners")
            .with_attr("jsonData", r#"["alice"]"#)]);
        assert_eq!(factory.name(), "init_ldap_datas");

        let config = factory.validate(RAW.as_bytes()).unwrap();
        let plugin = factory.create(config).unwrap();
        let ctx = PluginContext::default();

        Plugin::start(&plugin, &ctx).await.unwrap();
        assert_eq!(plugin.state(), SyncState::Ready);

        let txn = plugin.store().begin(TxnMode::Read).unwrap();
        let value = txn.read(&StorePath::parse("/team/owners").unwrap()).unwrap();
        plugin.store().abort(txn);
        assert_eq!(value, Some(json!(["alice"])));

        let next = factory
            .validate(RAW.replace("mem:389", "mem:636").as_bytes())
            .unwrap();
        Plugin::reconfigure(&plugin, &ctx, next).unwrap();
        assert_eq!(plugin.config().connection.address, "mem:636");

        Plugin::stop(&plugin, &ctx).await;
        assert_eq!(plugin.state(), SyncState::Stopped);
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let factory = factory(Vec::new());
        let err = factory
            .validate(br#"{"addr": "mem:389", "base_dn": "dc=x", "username": "u"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("password"));
    }

    #[tokio::test]
    async fn cancelled_context_stops_start() {
        let factory = factory(Vec::new());
        let plugin = factory.create(factory.validate(RAW.as_bytes()).unwrap()).unwrap();
        let ctx = PluginContext::new(CancellationToken::new());
        ctx.cancel.cancel();

        let err = Plugin::start(&plugin, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(plugin.state(), SyncState::Stopped);
    }

    #[tokio::test]
    async fn plugins_share_the_store() {
        let factory = factory(Vec::new());
        let a = factory.create(factory.validate(RAW.as_bytes()).unwrap()).unwrap();
        let b = factory.create(factory.validate(RAW.as_bytes()).unwrap()).unwrap();
        assert!(Arc::ptr_eq(a.store(), b.store()));
    }
}

//! Turns directory entries into documents and policy modules.

use dsync_directory::{DirectoryClient, DirectoryEntry, Filter, SearchRequest};
use dsync_policy::ModuleFile;
use dsync_store::StorePath;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{RecordSchema, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::types::DocumentSet;

/// Fetches both record categories from one base DN.
///
/// Each fetch is all-or-nothing: the first bad entry fails the whole fetch
/// and nothing fetched so far is returned.
pub struct RecordMapper<'a> {
    base_dn: &'a str,
    schema: &'a RecordSchema,
}

impl<'a> RecordMapper<'a> {
    pub fn new(base_dn: &'a str, schema: &'a RecordSchema) -> Self {
        Self { base_dn, schema }
    }

    pub fn from_config(config: &'a SyncConfig) -> Self {
        Self::new(&config.connection.base_dn, &config.schema)
    }

    pub fn document_request(&self) -> SearchRequest {
        SearchRequest::subtree(self.base_dn, Filter::object_class(&self.schema.document_class))
    }

    pub fn policy_request(&self) -> SearchRequest {
        SearchRequest::subtree(self.base_dn, Filter::object_class(&self.schema.policy_class))
    }

    /// Fetch every document entry. Later entries win on duplicate paths.
    pub async fn fetch_documents<C>(&self, client: &mut C) -> SyncResult<DocumentSet>
    where
        C: DirectoryClient + ?Sized,
    {
        let entries = client
            .search(&self.document_request())
            .await
            .map_err(SyncError::Search)?;

        let mut documents = DocumentSet::new();
        for entry in &entries {
            let (path, value) = self.decode_document(entry)?;
            if documents.insert(path, value).is_some() {
                debug!(dn = %entry.dn, "duplicate document path, later entry wins");
            }
        }
        info!(entries = entries.len(), documents = documents.len(), "fetched documents");
        Ok(documents)
    }

    /// Fetch and parse every policy entry.
    pub async fn fetch_policies<C>(&self, client: &mut C) -> SyncResult<Vec<ModuleFile>>
    where
        C: DirectoryClient + ?Sized,
    {
        let entries = client
            .search(&self.policy_request())
            .await
            .map_err(SyncError::Search)?;

        let policies = entries
            .iter()
            .map(|entry| self.decode_policy(entry))
            .collect::<SyncResult<Vec<_>>>()?;
        info!(policies = policies.len(), "fetched policies");
        Ok(policies)
    }

    pub fn decode_document(&self, entry: &DirectoryEntry) -> SyncResult<(StorePath, Value)> {
        let raw_path = entry
            .value(&self.schema.document_path_attr)
            .ok_or_else(|| missing(entry, &self.schema.document_path_attr))?;
        let invalid = |reason: String| SyncError::InvalidDocumentPath {
            dn: entry.dn.clone(),
            path: raw_path.to_string(),
            reason,
        };
        let path = StorePath::normalize(raw_path).map_err(|e| invalid(e.to_string()))?;
        if path.is_root() {
            return Err(invalid("the root path cannot hold a document".into()));
        }

        let content = entry
            .raw_value(&self.schema.document_content_attr)
            .ok_or_else(|| missing(entry, &self.schema.document_content_attr))?;
        let value = serde_json::from_slice(&content).map_err(|source| SyncError::Decode {
            dn: entry.dn.clone(),
            source,
        })?;
        Ok((path, value))
    }

    pub fn decode_policy(&self, entry: &DirectoryEntry) -> SyncResult<ModuleFile> {
        let id = entry
            .value(&self.schema.policy_id_attr)
            .ok_or_else(|| missing(entry, &self.schema.policy_id_attr))?;
        let content = entry
            .raw_value(&self.schema.policy_content_attr)
            .ok_or_else(|| missing(entry, &self.schema.policy_content_attr))?;
        Ok(ModuleFile::parse(id, content.into_owned())?)
    }
}

fn missing(entry: &DirectoryEntry, attribute: &str) -> SyncError {
    SyncError::MissingAttribute {
        dn: entry.dn.clone(),
        attribute: attribute.to_string(),
    }
}

use std::collections::BTreeMap;

use dsync_policy::{CompilerConfig, ModuleFile, PolicyCompiler, PolicyModule};
use dsync_store::{run_transaction, StorePath, Transaction, TransactionalStore, TxnMode, WriteOp};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::types::{CommitReport, DocumentSet};

/// Install `documents` and `policies` in one write transaction.
///
/// Documents are staged first. The whole policy set is then compiled
/// against the transaction's view, which already includes the staged
/// documents, so a rule that would shadow data is rejected. Policies are
/// written only after compilation succeeds. Any failure aborts the
/// transaction and leaves the store untouched.
///
/// Documents are merged: paths not in `documents` keep their content.
pub fn commit<S>(
    store: &S,
    documents: &DocumentSet,
    policies: &[ModuleFile],
    compiler: &CompilerConfig,
) -> SyncResult<CommitReport>
where
    S: TransactionalStore + ?Sized,
{
    run_transaction(store, TxnMode::Write, |txn| {
        for (path, value) in documents {
            if let Some(parent) = path.parent() {
                txn.make_dir(&parent)?;
            }
            txn.write(WriteOp::Add, path, value.clone())?;
        }
        debug!(documents = documents.len(), "documents staged");

        // Later modules with the same path replace earlier ones.
        let modules: BTreeMap<String, PolicyModule> = policies
            .iter()
            .map(|m| (m.path.clone(), m.parsed.clone()))
            .collect();

        let compiled = {
            let view: &S::Txn = txn;
            PolicyCompiler::with_default_stages(compiler.clone())
                .with_path_conflicts_check(|segments| {
                    view.non_empty(&StorePath::from_segments(segments.iter().cloned()))
                        .map_err(|e| e.to_string())
                })
                .compile(&modules)?
        };

        for module in policies {
            txn.upsert_policy(&module.path, &module.raw)?;
        }

        Ok::<_, SyncError>(CommitReport {
            documents: documents.len(),
            policies: modules.len(),
            rules: compiled.rules,
        })
    })
    .inspect(|report| {
        info!(
            documents = report.documents,
            policies = report.policies,
            rules = report.rules,
            "sync committed"
        );
    })
}

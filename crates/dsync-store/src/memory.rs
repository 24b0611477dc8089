use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::path::StorePath;
use crate::traits::{Transaction, TransactionalStore, TxnMode, WriteOp};

/// Full contents of the store at one point in time.
#[derive(Clone, Debug)]
struct Snapshot {
    data: Value,
    policies: BTreeMap<String, Vec<u8>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            data: Value::Object(Map::new()),
            policies: BTreeMap::new(),
        }
    }
}

struct Committed {
    version: u64,
    snapshot: Arc<Snapshot>,
}

/// In-memory, copy-on-write transactional store.
///
/// Every transaction starts from the latest committed snapshot. A write
/// transaction clones the snapshot on its first write and stages all further
/// changes in that private copy; commit swaps the copy in as the new
/// committed snapshot. Commits are optimistic: if another write transaction
/// committed in between, the later commit fails with
/// [`StoreError::Conflict`] and nothing is applied.
pub struct InMemoryStore {
    committed: RwLock<Committed>,
    next_txn: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    /// Create a store whose document namespace starts as `data`.
    ///
    /// `data` must be a JSON object.
    pub fn with_data(data: Value) -> StoreResult<Self> {
        if !data.is_object() {
            return Err(StoreError::write_conflict(
                StorePath::root(),
                "root document must be an object",
            ));
        }
        Ok(Self::from_snapshot(Snapshot {
            data,
            policies: BTreeMap::new(),
        }))
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            committed: RwLock::new(Committed {
                version: 0,
                snapshot: Arc::new(snapshot),
            }),
            next_txn: AtomicU64::new(1),
        }
    }

    /// Number of write transactions committed so far.
    pub fn version(&self) -> StoreResult<u64> {
        let committed = self.committed.read().map_err(poisoned)?;
        Ok(committed.version)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionalStore for InMemoryStore {
    type Txn = InMemoryTxn;

    fn begin(&self, mode: TxnMode) -> StoreResult<InMemoryTxn> {
        let committed = self.committed.read().map_err(poisoned)?;
        let id = self.next_txn.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(txn = id, ?mode, version = committed.version, "transaction opened");
        Ok(InMemoryTxn {
            id,
            mode,
            base_version: committed.version,
            base: Arc::clone(&committed.snapshot),
            staged: None,
        })
    }

    fn commit(&self, txn: InMemoryTxn) -> StoreResult<()> {
        let Some(staged) = txn.staged else {
            tracing::trace!(txn = txn.id, "transaction released without changes");
            return Ok(());
        };

        let mut committed = self.committed.write().map_err(poisoned)?;
        if committed.version != txn.base_version {
            return Err(StoreError::Conflict(txn.id));
        }
        committed.version += 1;
        committed.snapshot = Arc::new(staged);
        tracing::debug!(txn = txn.id, version = committed.version, "transaction committed");
        Ok(())
    }

    fn abort(&self, txn: InMemoryTxn) {
        tracing::debug!(
            txn = txn.id,
            discarded = txn.staged.is_some(),
            "transaction aborted"
        );
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.version().ok();
        f.debug_struct("InMemoryStore")
            .field("version", &version)
            .finish()
    }
}

/// A transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTxn {
    id: u64,
    mode: TxnMode,
    base_version: u64,
    base: Arc<Snapshot>,
    staged: Option<Snapshot>,
}

impl InMemoryTxn {
    fn view(&self) -> &Snapshot {
        self.staged.as_ref().unwrap_or(&self.base)
    }

    fn staged_mut(&mut self) -> StoreResult<&mut Snapshot> {
        if self.mode == TxnMode::Read {
            return Err(StoreError::ReadOnly(self.id));
        }
        Ok(self.staged.get_or_insert_with(|| (*self.base).clone()))
    }
}

impl Transaction for InMemoryTxn {
    fn id(&self) -> u64 {
        self.id
    }

    fn mode(&self) -> TxnMode {
        self.mode
    }

    fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        Ok(lookup(&self.view().data, path).cloned())
    }

    fn write(&mut self, op: WriteOp, path: &StorePath, value: Value) -> StoreResult<()> {
        let staged = self.staged_mut()?;
        apply(&mut staged.data, op, path, value)
    }

    fn upsert_policy(&mut self, id: &str, raw: &[u8]) -> StoreResult<()> {
        let staged = self.staged_mut()?;
        staged.policies.insert(id.to_string(), raw.to_vec());
        Ok(())
    }

    fn get_policy(&self, id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.view().policies.get(id).cloned())
    }

    fn list_policies(&self) -> StoreResult<Vec<String>> {
        Ok(self.view().policies.keys().cloned().collect())
    }

    fn delete_policy(&mut self, id: &str) -> StoreResult<bool> {
        let staged = self.staged_mut()?;
        Ok(staged.policies.remove(id).is_some())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Internal("lock poisoned".into())
}

fn lookup<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments().iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_mut<'a>(root: &'a mut Value, path: &StorePath) -> Option<&'a mut Value> {
    path.segments().iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

fn apply(root: &mut Value, op: WriteOp, path: &StorePath, value: Value) -> StoreResult<()> {
    let Some(key) = path.last() else {
        return match op {
            WriteOp::Remove => Err(StoreError::write_conflict(
                path,
                "cannot remove the root document",
            )),
            WriteOp::Add | WriteOp::Replace if value.is_object() => {
                *root = value;
                Ok(())
            }
            WriteOp::Add | WriteOp::Replace => Err(StoreError::write_conflict(
                path,
                "root document must be an object",
            )),
        };
    };

    let parent_path = path.prefix(path.len() - 1);
    let parent = lookup_mut(root, &parent_path)
        .ok_or_else(|| StoreError::NotFound(parent_path.to_string()))?;

    match parent {
        Value::Object(map) => match op {
            WriteOp::Add => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            WriteOp::Replace => match map.get_mut(key) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(StoreError::NotFound(path.to_string())),
            },
            WriteOp::Remove => map
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(path.to_string())),
        },
        Value::Array(items) => {
            let index = array_index(key, items.len(), op, path)?;
            match op {
                WriteOp::Add => items.insert(index, value),
                WriteOp::Replace => items[index] = value,
                WriteOp::Remove => {
                    items.remove(index);
                }
            }
            Ok(())
        }
        _ => Err(StoreError::write_conflict(
            parent_path,
            "path refers to non-object document",
        )),
    }
}

fn array_index(key: &str, len: usize, op: WriteOp, path: &StorePath) -> StoreResult<usize> {
    if key == "-" && op == WriteOp::Add {
        return Ok(len);
    }
    let index: usize = key
        .parse()
        .map_err(|_| StoreError::write_conflict(path, "invalid array index"))?;
    let limit = if op == WriteOp::Add { len } else { len.saturating_sub(1) };
    if index > limit || (op != WriteOp::Add && len == 0) {
        return Err(StoreError::NotFound(path.to_string()));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::run_transaction;
    use serde_json::json;

    fn p(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    fn read_committed(store: &InMemoryStore, path: &str) -> Option<Value> {
        let txn = store.begin(TxnMode::Read).unwrap();
        let value = txn.read(&p(path)).unwrap();
        store.commit(txn).unwrap();
        value
    }

    // -----------------------------------------------------------------------
    // Document writes
    // -----------------------------------------------------------------------

    #[test]
    fn add_and_read_back() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        txn.write(WriteOp::Add, &p("/a"), json!({"x": 1})).unwrap();
        assert_eq!(txn.read(&p("/a/x")).unwrap(), Some(json!(1)));
        store.commit(txn).unwrap();

        assert_eq!(read_committed(&store, "/a"), Some(json!({"x": 1})));
        assert_eq!(store.version().unwrap(), 1);
    }

    #[test]
    fn add_requires_parent() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        let err = txn.write(WriteOp::Add, &p("/a/b"), json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref path) if path == "/a"));
    }

    #[test]
    fn add_under_scalar_is_conflict() {
        let store = InMemoryStore::with_data(json!({"a": 5})).unwrap();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        let err = txn.write(WriteOp::Add, &p("/a/b"), json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict { .. }));
    }

    #[test]
    fn replace_and_remove_require_existing() {
        let store = InMemoryStore::with_data(json!({"a": {"b": 1}})).unwrap();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        assert!(matches!(
            txn.write(WriteOp::Replace, &p("/a/c"), json!(2)),
            Err(StoreError::NotFound(_))
        ));
        txn.write(WriteOp::Replace, &p("/a/b"), json!(2)).unwrap();
        assert_eq!(txn.read(&p("/a/b")).unwrap(), Some(json!(2)));
        txn.write(WriteOp::Remove, &p("/a/b"), Value::Null).unwrap();
        assert_eq!(txn.read(&p("/a/b")).unwrap(), None);
        assert!(matches!(
            txn.write(WriteOp::Remove, &p("/a/b"), Value::Null),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn array_operations() {
        let store = InMemoryStore::with_data(json!({"xs": [1, 2]})).unwrap();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        txn.write(WriteOp::Add, &p("/xs/-"), json!(3)).unwrap();
        txn.write(WriteOp::Add, &p("/xs/0"), json!(0)).unwrap();
        txn.write(WriteOp::Replace, &p("/xs/1"), json!(10)).unwrap();
        txn.write(WriteOp::Remove, &p("/xs/3"), Value::Null).unwrap();
        assert_eq!(txn.read(&p("/xs")).unwrap(), Some(json!([0, 10, 2])));
        assert!(txn.write(WriteOp::Replace, &p("/xs/9"), json!(1)).is_err());
        assert!(txn.write(WriteOp::Add, &p("/xs/nope"), json!(1)).is_err());
    }

    #[test]
    fn root_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        assert!(txn.write(WriteOp::Add, &StorePath::root(), json!(1)).is_err());
        assert!(txn
            .write(WriteOp::Remove, &StorePath::root(), Value::Null)
            .is_err());
        txn.write(WriteOp::Add, &StorePath::root(), json!({"k": true}))
            .unwrap();
        assert_eq!(txn.read(&p("/k")).unwrap(), Some(json!(true)));
    }

    #[test]
    fn with_data_rejects_non_object() {
        assert!(InMemoryStore::with_data(json!([1])).is_err());
    }

    // -----------------------------------------------------------------------
    // make_dir / non_empty
    // -----------------------------------------------------------------------

    #[test]
    fn make_dir_creates_intermediate_objects() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        txn.make_dir(&p("/a/b/c")).unwrap();
        assert_eq!(txn.read(&p("/a")).unwrap(), Some(json!({"b": {"c": {}}})));
        // Existing objects are left alone.
        txn.write(WriteOp::Add, &p("/a/b/c/d"), json!(1)).unwrap();
        txn.make_dir(&p("/a/b/c")).unwrap();
        assert_eq!(txn.read(&p("/a/b/c/d")).unwrap(), Some(json!(1)));
    }

    #[test]
    fn make_dir_through_scalar_fails() {
        let store = InMemoryStore::with_data(json!({"a": "leaf"})).unwrap();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        let err = txn.make_dir(&p("/a/b")).unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict { ref path, .. } if path == "/a"));
    }

    #[test]
    fn non_empty_semantics() {
        let store = InMemoryStore::with_data(json!({"cfg": {"a": {"x": 1}}, "leaf": 3})).unwrap();
        let txn = store.begin(TxnMode::Read).unwrap();
        assert!(txn.non_empty(&p("/cfg/a")).unwrap());
        assert!(txn.non_empty(&p("/cfg")).unwrap());
        assert!(!txn.non_empty(&p("/cfg/b")).unwrap());
        assert!(!txn.non_empty(&p("/nothing/here")).unwrap());
        // Nearest existing ancestor is a scalar.
        assert!(txn.non_empty(&p("/leaf/deeper")).unwrap());
    }

    // -----------------------------------------------------------------------
    // Policy namespace
    // -----------------------------------------------------------------------

    #[test]
    fn policy_upsert_list_delete() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        txn.upsert_policy("b.rego", b"package b").unwrap();
        txn.upsert_policy("a.rego", b"package a").unwrap();
        txn.upsert_policy("a.rego", b"package a2").unwrap();
        assert_eq!(txn.list_policies().unwrap(), vec!["a.rego", "b.rego"]);
        assert_eq!(txn.get_policy("a.rego").unwrap().unwrap(), b"package a2");
        assert!(txn.delete_policy("b.rego").unwrap());
        assert!(!txn.delete_policy("b.rego").unwrap());
        store.commit(txn).unwrap();

        let txn = store.begin(TxnMode::Read).unwrap();
        assert_eq!(txn.list_policies().unwrap(), vec!["a.rego"]);
    }

    // -----------------------------------------------------------------------
    // Transaction semantics
    // -----------------------------------------------------------------------

    #[test]
    fn read_transaction_rejects_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Read).unwrap();
        assert!(matches!(
            txn.write(WriteOp::Add, &p("/a"), json!(1)),
            Err(StoreError::ReadOnly(_))
        ));
        assert!(matches!(
            txn.upsert_policy("x", b""),
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[test]
    fn abort_discards_everything() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(TxnMode::Write).unwrap();
        txn.write(WriteOp::Add, &p("/a"), json!(1)).unwrap();
        txn.upsert_policy("p.rego", b"package p").unwrap();
        store.abort(txn);

        assert_eq!(read_committed(&store, "/a"), None);
        let txn = store.begin(TxnMode::Read).unwrap();
        assert!(txn.list_policies().unwrap().is_empty());
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn readers_do_not_see_staged_writes() {
        let store = InMemoryStore::new();
        let mut writer = store.begin(TxnMode::Write).unwrap();
        writer.write(WriteOp::Add, &p("/a"), json!(1)).unwrap();

        let reader = store.begin(TxnMode::Read).unwrap();
        assert_eq!(reader.read(&p("/a")).unwrap(), None);
        store.commit(writer).unwrap();
        // A transaction keeps the snapshot it started from.
        assert_eq!(reader.read(&p("/a")).unwrap(), None);
        assert_eq!(read_committed(&store, "/a"), Some(json!(1)));
    }

    #[test]
    fn concurrent_writers_conflict() {
        let store = InMemoryStore::new();
        let mut first = store.begin(TxnMode::Write).unwrap();
        let mut second = store.begin(TxnMode::Write).unwrap();
        first.write(WriteOp::Add, &p("/a"), json!(1)).unwrap();
        second.write(WriteOp::Add, &p("/b"), json!(2)).unwrap();
        store.commit(first).unwrap();
        assert!(matches!(store.commit(second), Err(StoreError::Conflict(_))));
        assert_eq!(read_committed(&store, "/b"), None);
    }

    #[test]
    fn run_transaction_commits_on_ok() {
        let store = InMemoryStore::new();
        let n: StoreResult<usize> = run_transaction(&store, TxnMode::Write, |txn| {
            txn.write(WriteOp::Add, &p("/a"), json!("v"))?;
            Ok(1)
        });
        assert_eq!(n.unwrap(), 1);
        assert_eq!(read_committed(&store, "/a"), Some(json!("v")));
    }

    #[test]
    fn run_transaction_aborts_on_err() {
        let store = InMemoryStore::new();
        let result: StoreResult<()> = run_transaction(&store, TxnMode::Write, |txn| {
            txn.write(WriteOp::Add, &p("/a"), json!("v"))?;
            txn.write(WriteOp::Add, &p("/missing/child"), json!(1))
        });
        assert!(result.is_err());
        assert_eq!(read_committed(&store, "/a"), None);
    }
}

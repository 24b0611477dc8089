use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::path::StorePath;

/// Whether a transaction may modify the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnMode {
    Read,
    Write,
}

/// Document write operations, with JSON Patch semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or overwrite the value at the path. The parent must exist.
    Add,
    /// Overwrite an existing value. Fails if nothing is at the path.
    Replace,
    /// Delete an existing value. Fails if nothing is at the path.
    Remove,
}

/// A unit of work against a [`TransactionalStore`].
///
/// Implementations stage writes privately. Nothing written through a
/// transaction is visible elsewhere until the owning store commits it.
pub trait Transaction: Send {
    /// Store-unique transaction identifier (for logs and errors).
    fn id(&self) -> u64;

    fn mode(&self) -> TxnMode;

    /// Read the document at `path`.
    ///
    /// Returns `Ok(None)` if nothing exists there.
    fn read(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Apply a write operation to the document namespace.
    ///
    /// `value` is ignored for [`WriteOp::Remove`].
    fn write(&mut self, op: WriteOp, path: &StorePath, value: Value) -> StoreResult<()>;

    /// Insert or overwrite the raw source of a policy module.
    fn upsert_policy(&mut self, id: &str, raw: &[u8]) -> StoreResult<()>;

    /// Raw source of a policy module, if installed.
    fn get_policy(&self, id: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Sorted ids of all installed policy modules.
    fn list_policies(&self) -> StoreResult<Vec<String>>;

    /// Remove a policy module. Returns `true` if it existed.
    fn delete_policy(&mut self, id: &str) -> StoreResult<bool>;

    /// Ensure every segment of `path` exists as an object, creating empty
    /// objects where nothing exists yet.
    ///
    /// Fails with [`StoreError::WriteConflict`] if some prefix of the path
    /// holds a non-object value.
    fn make_dir(&mut self, path: &StorePath) -> StoreResult<()> {
        if path.is_root() {
            return Ok(());
        }
        match self.read(path)? {
            Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(StoreError::write_conflict(
                path,
                "path refers to non-object document",
            )),
            None => {
                if let Some(parent) = path.parent() {
                    self.make_dir(&parent)?;
                }
                self.write(WriteOp::Add, path, Value::Object(Default::default()))
            }
        }
    }

    /// Whether the store holds content that a new value at `path` would
    /// collide with.
    ///
    /// That is the case if a value exists at `path` itself, or if the nearest
    /// existing ancestor of `path` is not an object.
    fn non_empty(&self, path: &StorePath) -> StoreResult<bool> {
        if self.read(path)?.is_some() {
            return Ok(true);
        }
        for n in (1..path.len()).rev() {
            if let Some(value) = self.read(&path.prefix(n))? {
                return Ok(!value.is_object());
            }
        }
        Ok(false)
    }
}

/// A store that exposes its namespaces through atomic transactions.
pub trait TransactionalStore: Send + Sync {
    type Txn: Transaction;

    /// Open a new transaction.
    fn begin(&self, mode: TxnMode) -> StoreResult<Self::Txn>;

    /// Make every write staged in `txn` visible at once.
    ///
    /// Committing a read transaction only releases it.
    fn commit(&self, txn: Self::Txn) -> StoreResult<()>;

    /// Discard `txn` and everything it staged.
    fn abort(&self, txn: Self::Txn);
}

/// Run `f` inside a transaction, committing if it returns `Ok` and aborting
/// if it returns `Err`.
pub fn run_transaction<S, T, E, F>(store: &S, mode: TxnMode, f: F) -> Result<T, E>
where
    S: TransactionalStore + ?Sized,
    E: From<StoreError>,
    F: FnOnce(&mut S::Txn) -> Result<T, E>,
{
    let mut txn = store.begin(mode)?;
    match f(&mut txn) {
        Ok(value) => {
            store.commit(txn)?;
            Ok(value)
        }
        Err(err) => {
            store.abort(txn);
            Err(err)
        }
    }
}

use tracing::{debug, warn};

use crate::{
    error::{DbError, DbResult},
    util::hex,
    Db,
};

/// A single transaction step, applied to the store it is given.
pub type TransactionOp<'a> = Box<dyn FnOnce(&dyn Db) -> DbResult<()> + Send + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Committed,
    RolledBack,
}

/// Best-effort atomic application of a sequence of writes, for stores without native atomic
/// batches.
///
/// Operations are applied one by one. If one fails, every key written by the operations that
/// succeeded before it is deleted, most recent first, and the transaction ends
/// [TransactionState::RolledBack].
///
/// There is no isolation: concurrent readers observe the writes as they are applied, and a
/// rollback deletes the keys whatever their value before the transaction or any concurrent
/// write to them in between.
pub struct Transaction<'a> {
    ops: Vec<(Vec<u8>, TransactionOp<'a>)>,
    state: TransactionState,
}

impl Default for Transaction<'_> {
    fn default() -> Self {
        Transaction::new()
    }
}

impl<'a> Transaction<'a> {
    /// Creates a new empty [Transaction].
    pub fn new() -> Self {
        Transaction {
            ops: Vec::new(),
            state: TransactionState::Pending,
        }
    }

    /// Appends `op`, which writes `key`. `key` is the one deleted if the transaction is rolled
    /// back after `op` succeeded.
    pub fn append(&mut self, key: &[u8], op: TransactionOp<'a>) {
        self.ops.push((key.to_vec(), op));
    }

    /// Appends setting `key` to `value`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let (k, v) = (key.to_vec(), value.to_vec());
        self.append(key, Box::new(move |db: &dyn Db| db.set(&k, &v)));
    }

    /// Appends setting `key` to `value`, durably.
    pub fn set_sync(&mut self, key: &[u8], value: &[u8]) {
        let (k, v) = (key.to_vec(), value.to_vec());
        self.append(key, Box::new(move |db: &dyn Db| db.set_sync(&k, &v)));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Applies the operations to `db` in order.
    ///
    /// On the first failure, rolls back and returns [DbError::RolledBack] carrying the index
    /// and error of the failed operation, or [DbError::RollbackFailed] if a rollback deletion
    /// failed too (the store may then be left partially written). A finished transaction
    /// returns [DbError::TransactionFinished].
    pub fn transact(&mut self, db: &dyn Db) -> DbResult<()> {
        if self.state != TransactionState::Pending {
            return Err(DbError::TransactionFinished);
        }

        let ops = std::mem::take(&mut self.ops);
        let mut applied: Vec<Vec<u8>> = Vec::with_capacity(ops.len());

        for (index, (key, op)) in ops.into_iter().enumerate() {
            if let Err(err) = op(db) {
                warn!(index, key = %hex(&key), error = %err, "Transaction failed, rolling back");
                self.state = TransactionState::RolledBack;

                return Err(rollback(db, &applied, index, err));
            }

            applied.push(key);
        }

        debug!(ops = applied.len(), "Transaction committed");
        self.state = TransactionState::Committed;

        Ok(())
    }
}

/// Deletes the `applied` keys most recent first, carrying on past failed deletions.
fn rollback(db: &dyn Db, applied: &[Vec<u8>], index: usize, cause: DbError) -> DbError {
    let mut failure = None;

    for key in applied.iter().rev() {
        if let Err(err) = db.delete(key) {
            warn!(key = %hex(key), error = %err, "Rollback deletion failed");
            if failure.is_none() {
                failure = Some((key.clone(), err));
            }
        }
    }

    match failure {
        Some((key, err)) => DbError::RollbackFailed {
            key,
            cause: Box::new(cause),
            source: Box::new(err),
        },
        None => DbError::RolledBack {
            index,
            source: Box::new(cause),
        },
    }
}

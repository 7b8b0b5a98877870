use crate::{
    error::{DbError, DbResult},
    util::check_key,
};

/// A group of writes accumulated without touching the store and applied together.
///
/// Once written (successfully or not) or closed, a batch rejects any further use with
/// [DbError::BatchClosed].
pub trait Batch: Send {
    /// Queues setting `key` to `value`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Queues deleting `key`.
    fn delete(&mut self, key: &[u8]) -> DbResult<()>;

    /// Applies the queued operations in order, then closes the batch.
    fn write(&mut self) -> DbResult<()>;

    /// Same as [Batch::write], additionally waiting for the writes to be durable.
    fn write_sync(&mut self) -> DbResult<()>;

    /// Discards the queued operations. Idempotent.
    fn close(&mut self) -> DbResult<()>;
}

/// A single queued write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Operation {
    /// Returns the key affected by the operation.
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Set { key, .. } | Operation::Delete { key } => key,
        }
    }
}

/// The ordered operation log backing every [Batch] implementation.
#[derive(Debug)]
pub struct OperationLog {
    // `None` once the log has been taken or closed.
    ops: Option<Vec<Operation>>,
}

impl Default for OperationLog {
    fn default() -> Self {
        OperationLog::new()
    }
}

impl OperationLog {
    /// Creates a new open [OperationLog].
    pub fn new() -> Self {
        OperationLog {
            ops: Some(Vec::new()),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.push(key, |key| Operation::Set {
            key,
            value: value.to_vec(),
        })
    }

    pub fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.push(key, |key| Operation::Delete { key })
    }

    fn push(&mut self, key: &[u8], op: impl FnOnce(Vec<u8>) -> Operation) -> DbResult<()> {
        let ops = self.ops.as_mut().ok_or(DbError::BatchClosed)?;
        check_key(key)?;

        ops.push(op(key.to_vec()));
        Ok(())
    }

    /// Returns the queued operations and closes the log, so that a write is attempted at most
    /// once whatever its outcome.
    pub fn take(&mut self) -> DbResult<Vec<Operation>> {
        self.ops.take().ok_or(DbError::BatchClosed)
    }

    pub fn close(&mut self) {
        self.ops = None;
    }

    pub fn is_closed(&self) -> bool {
        self.ops.is_none()
    }

    /// Returns the number of queued operations (0 once closed).
    pub fn len(&self) -> usize {
        self.ops.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

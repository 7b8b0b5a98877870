use tracing::debug;

use super::MemDb;
use crate::{
    batch::{Batch, OperationLog},
    error::DbResult,
};

/// A [Batch] applied to a [MemDb] under a single write lock: readers and iterator snapshots
/// observe either none or all of its operations.
#[derive(Debug)]
pub struct MemDbBatch {
    db: MemDb,
    log: OperationLog,
}

impl MemDbBatch {
    /// Creates a new [MemDbBatch].
    pub fn new(db: MemDb) -> Self {
        MemDbBatch {
            db,
            log: OperationLog::new(),
        }
    }
}

impl Batch for MemDbBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.log.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.log.delete(key)
    }

    fn write(&mut self) -> DbResult<()> {
        let ops = self.log.take()?;
        debug!(ops = ops.len(), "Writing MemDb batch");

        self.db.apply(ops);
        Ok(())
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.write()
    }

    fn close(&mut self) -> DbResult<()> {
        self.log.close();
        Ok(())
    }
}

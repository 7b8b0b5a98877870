//! Adapter turning a raw ordered storage engine into a [Db].
//!
//! An [Engine] only provides raw point operations, range cursors and batch application.
//! [EngineDb] adds everything the [Db] contract requires on top of it once for all engines: key
//! validation, the iterator validity state machine and batches.

mod sled;

use std::{collections::BTreeMap, iter, sync::Arc};

use tracing::debug;

use crate::{
    batch::{Batch, Operation, OperationLog},
    error::{DbError, DbResult},
    iterator::{in_domain, DbIterator},
    transaction::Transaction,
    util::{check_bounds, check_key},
    Db,
};

pub use self::sled::SledEngine;

/// A fallible stream of `(key, value)` entries in traversal order.
pub type Cursor = Box<dyn Iterator<Item = DbResult<(Vec<u8>, Vec<u8>)>> + Send>;

/// The capabilities a storage engine must provide to be served as a [Db].
pub trait Engine: Send + Sync + 'static {
    /// Engine name, as reported in logs.
    const NAME: &'static str;

    /// Whether [Engine::write_batch] applies its operations atomically. Batches on engines
    /// without atomic batches are applied through a [Transaction].
    const ATOMIC_BATCH: bool;

    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Stores `value` for `key`, durably if `sync` is set.
    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> DbResult<()>;

    /// Removes `key`, durably if `sync` is set.
    fn remove(&self, key: &[u8], sync: bool) -> DbResult<()>;

    /// Returns a cursor over `[start, end)`, in decreasing key order if `reverse` is set.
    fn cursor(&self, start: Option<&[u8]>, end: Option<&[u8]>, reverse: bool)
        -> DbResult<Cursor>;

    /// Applies `ops` in order. Only called when [Engine::ATOMIC_BATCH] is set.
    fn write_batch(&self, ops: Vec<Operation>, sync: bool) -> DbResult<()>;

    fn stats(&self) -> BTreeMap<String, String>;

    fn close(&self) -> DbResult<()>;
}

/// A [Db] served by an [Engine].
///
/// Cloning an [EngineDb] returns another handle to the same engine.
pub struct EngineDb<E> {
    engine: Arc<E>,
}

impl<E> Clone for EngineDb<E> {
    fn clone(&self) -> Self {
        EngineDb {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: Engine> EngineDb<E> {
    pub fn new(engine: E) -> Self {
        EngineDb {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn new_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;

        let cursor = self.engine.cursor(start, end, reverse)?;
        Ok(Box::new(EngineIterator::new(cursor, start, end)))
    }
}

impl<E: Engine> Db for EngineDb<E> {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;
        self.engine.get(key)
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        check_key(key)?;
        Ok(self.engine.get(key)?.is_some())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.engine.put(key, value, false)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.engine.put(key, value, true)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.engine.remove(key, false)
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.engine.remove(key, true)
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        self.new_iterator(start, end, false)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        self.new_iterator(start, end, true)
    }

    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(EngineBatch {
            db: self.clone(),
            log: OperationLog::new(),
        })
    }

    fn stats(&self) -> BTreeMap<String, String> {
        self.engine.stats()
    }

    fn close(&self) -> DbResult<()> {
        debug!(engine = E::NAME, "Closing engine");
        self.engine.close()
    }
}

/// Iterator over an engine [Cursor].
///
/// Entries outside of the iterator domain end the iteration, as do cursor errors, which are
/// then reported by [DbIterator::error].
pub struct EngineIterator {
    cursor: Cursor,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    error: Option<DbError>,
}

impl EngineIterator {
    fn new(cursor: Cursor, start: Option<&[u8]>, end: Option<&[u8]>) -> Self {
        let mut itr = EngineIterator {
            cursor,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            current: None,
            error: None,
        };
        itr.advance();

        itr
    }

    fn advance(&mut self) {
        self.current = match self.cursor.next() {
            Some(Ok((key, value))) if self.contains(&key) => Some((key, value)),
            Some(Ok(_)) | None => None,
            Some(Err(err)) => {
                self.error = Some(err);
                None
            }
        };

        if self.current.is_none() {
            self.release();
        }
    }

    fn contains(&self, key: &[u8]) -> bool {
        in_domain(key, self.start.as_deref(), self.end.as_deref())
    }

    fn release(&mut self) {
        self.cursor = Box::new(iter::empty());
    }

    fn current(&self, op: &str) -> &(Vec<u8>, Vec<u8>) {
        match &self.current {
            Some(entry) => entry,
            None => panic!("called {op}() on invalid iterator"),
        }
    }
}

impl DbIterator for EngineIterator {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        self.current("next");
        self.advance();
    }

    fn key(&self) -> &[u8] {
        &self.current("key").0
    }

    fn value(&self) -> &[u8] {
        &self.current("value").1
    }

    fn error(&self) -> Option<&DbError> {
        self.error.as_ref()
    }

    fn close(&mut self) -> DbResult<()> {
        self.current = None;
        self.release();

        Ok(())
    }
}

/// A [Batch] over an [EngineDb].
///
/// Applied with the engine's atomic batch when it has one, through a [Transaction] otherwise.
pub struct EngineBatch<E> {
    db: EngineDb<E>,
    log: OperationLog,
}

impl<E: Engine> EngineBatch<E> {
    fn write_ops(&mut self, sync: bool) -> DbResult<()> {
        let ops = self.log.take()?;
        debug!(engine = E::NAME, ops = ops.len(), sync, "Writing batch");

        if E::ATOMIC_BATCH {
            return self.db.engine.write_batch(ops, sync);
        }

        let mut tx = Transaction::new();
        for op in ops {
            let key = op.key().to_vec();
            tx.append(
                &key,
                Box::new(move |db: &dyn Db| match op {
                    Operation::Set { key, value } if sync => db.set_sync(&key, &value),
                    Operation::Set { key, value } => db.set(&key, &value),
                    Operation::Delete { key } if sync => db.delete_sync(&key),
                    Operation::Delete { key } => db.delete(&key),
                }),
            );
        }

        tx.transact(&self.db)
    }
}

impl<E: Engine> Batch for EngineBatch<E> {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.log.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.log.delete(key)
    }

    fn write(&mut self) -> DbResult<()> {
        self.write_ops(false)
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.write_ops(true)
    }

    fn close(&mut self) -> DbResult<()> {
        self.log.close();
        Ok(())
    }
}

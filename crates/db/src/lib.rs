//! Uniform ordered key-value store abstraction.
//!
//! Every store implements [Db]: point reads and writes, half-open range iteration in both
//! directions through [DbIterator], and grouped writes through [Batch]. Keys are non-empty byte
//! strings compared byte-lexicographically.
//!
//! - [MemDb]: in-memory reference store.
//! - [PrefixDb]: a view of another store restricted to the keys sharing a fixed prefix.
//! - [engine::EngineDb]: the adapter turning a raw storage [engine::Engine] (sled) into a [Db].
//! - [Transaction]: best-effort atomicity for engines without native atomic batches.
//!
//! Stores are instantiated by backend name through a [Registry].

use std::{collections::BTreeMap, io};

pub mod batch;
pub mod engine;
pub mod error;
pub mod iterator;
pub mod memdb;
pub mod prefix;
pub mod registry;
pub mod transaction;

mod util;

pub use batch::{Batch, Operation, OperationLog};
pub use error::{DbError, DbResult};
pub use iterator::DbIterator;
pub use memdb::MemDb;
pub use prefix::{iterate_prefix, prefix_end, PrefixDb};
pub use registry::{BackendType, DbConfig, Registry};
pub use transaction::{Transaction, TransactionState};

/// An ordered key-value store.
///
/// Every operation rejects empty keys with [DbError::KeyEmpty] before touching the store.
pub trait Db: Send + Sync {
    /// Fetches the value stored for `key`, `None` if absent.
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Returns `true` if `key` is present.
    fn has(&self, key: &[u8]) -> DbResult<bool>;

    /// Sets `key` to `value`.
    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Sets `key` to `value` and waits for the write to be durable.
    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Deletes `key`. Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> DbResult<()>;

    /// Deletes `key` and waits for the write to be durable.
    fn delete_sync(&self, key: &[u8]) -> DbResult<()>;

    /// Returns an iterator over `[start, end)` in increasing key order. `None` leaves the
    /// corresponding side unbounded.
    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>)
        -> DbResult<Box<dyn DbIterator>>;

    /// Returns an iterator over `[start, end)` in decreasing key order.
    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>>;

    /// Creates a new [Batch] writing to this store.
    fn new_batch(&self) -> Box<dyn Batch>;

    /// Returns store statistics, at least `database.type` for concrete stores.
    fn stats(&self) -> BTreeMap<String, String>;

    /// Closes the store.
    fn close(&self) -> DbResult<()>;

    /// Dumps every entry to stdout.
    fn print(&self) -> DbResult<()> {
        dump(self, &mut io::stdout().lock())
    }
}

/// Writes every entry of `db` to `out`, one `[KEY]:\t[VALUE]` hex line per entry.
pub fn dump<D>(db: &D, out: &mut dyn io::Write) -> DbResult<()>
where
    D: Db + ?Sized,
{
    let mut itr = db.iterator(None, None)?;

    while itr.valid() {
        writeln!(out, "[{}]:\t[{}]", util::hex(itr.key()), util::hex(itr.value()))
            .map_err(DbError::backend)?;
        itr.next();
    }

    if let Some(err) = itr.error() {
        let err = DbError::backend(err.to_string());
        itr.close()?;
        return Err(err);
    }

    itr.close()
}

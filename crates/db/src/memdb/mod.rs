mod batch;
mod iterator;

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use kvdb_tree::OrderedMap;
use tracing::debug;

use crate::{
    batch::{Batch, Operation},
    error::DbResult,
    iterator::DbIterator,
    util::{check_bounds, check_key},
    Db,
};

pub use batch::MemDbBatch;
pub use iterator::MemDbIterator;

/// An in-memory [Db] backed by an [OrderedMap].
///
/// Point operations take a single reader/writer lock around the map and are linearizable.
/// Iterators observe a snapshot of the store taken at creation (the map is persistent, so the
/// snapshot is a cheap clone): later writes are not visible to them and open iterators never
/// block writers.
///
/// Cloning a [MemDb] returns another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemDb {
    tree: Arc<RwLock<OrderedMap>>,
}

impl MemDb {
    /// Creates a new empty [MemDb].
    pub fn new() -> Self {
        MemDb {
            tree: Arc::new(RwLock::new(OrderedMap::new())),
        }
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Map operations do not panic, so a poisoned lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, OrderedMap> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, OrderedMap> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `ops` in order under a single write lock.
    pub(crate) fn apply(&self, ops: Vec<Operation>) {
        let mut tree = self.write();

        for op in ops {
            match op {
                Operation::Set { key, value } => {
                    tree.insert(key, value);
                }
                Operation::Delete { key } => {
                    tree.remove(&key);
                }
            }
        }
    }

    fn new_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;

        let snapshot = self.read().clone();
        Ok(Box::new(MemDbIterator::new(snapshot, start, end, reverse)?))
    }
}

impl Db for MemDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;

        Ok(self.read().get(key).map(<[u8]>::to_vec))
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        check_key(key)?;

        Ok(self.read().contains_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;

        self.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;

        self.write().remove(key);
        Ok(())
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.delete(key)
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
        Box::new(MemDbBatch::new(self.clone()))
    }

    fn stats(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("database.type".to_string(), "memDB".to_string()),
            ("database.size".to_string(), self.len().to_string()),
        ])
    }

    fn close(&self) -> DbResult<()> {
        // Nothing to flush, and the entries must survive a close.
        debug!(size = self.len(), "MemDb closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;

    fn collect(itr: &mut dyn DbIterator) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        while itr.valid() {
            keys.push(itr.key().to_vec());
            itr.next();
        }
        itr.close().unwrap();
        keys
    }

    fn keys(ks: &[&str]) -> Vec<Vec<u8>> {
        ks.iter().map(|k| k.as_bytes().to_vec()).collect()
    }

    fn populated() -> MemDb {
        let db = MemDb::new();
        for k in ["a", "b", "c", "d", "e"] {
            db.set(k.as_bytes(), k.as_bytes()).unwrap();
        }
        db
    }

    #[test]
    fn test_get_set_delete() {
        let db = MemDb::new();
        assert_eq!(db.get(b"key").unwrap(), None);
        assert!(!db.has(b"key").unwrap());

        db.set(b"key", b"value").unwrap();
        assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert!(db.has(b"key").unwrap());

        db.set(b"empty", b"").unwrap();
        assert_eq!(db.get(b"empty").unwrap(), Some(Vec::new()));

        db.delete(b"key").unwrap();
        assert_eq!(db.get(b"key").unwrap(), None);
        assert!(!db.has(b"key").unwrap());

        // Deleting a missing key is fine.
        db.delete_sync(b"key").unwrap();
    }

    #[test]
    fn test_empty_keys_rejected() {
        let db = MemDb::new();
        assert!(matches!(db.get(b""), Err(DbError::KeyEmpty)));
        assert!(matches!(db.has(b""), Err(DbError::KeyEmpty)));
        assert!(matches!(db.set(b"", b"v"), Err(DbError::KeyEmpty)));
        assert!(matches!(db.delete(b""), Err(DbError::KeyEmpty)));
        assert!(matches!(db.iterator(Some(b"".as_slice()), None), Err(DbError::KeyEmpty)));
        assert!(matches!(db.reverse_iterator(None, Some(b"".as_slice())), Err(DbError::KeyEmpty)));
        assert!(db.is_empty());
    }

    #[test]
    fn test_forward_ranges() {
        let db = populated();

        let mut itr = db.iterator(None, None).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["a", "b", "c", "d", "e"]));

        let mut itr = db.iterator(Some(b"b".as_slice()), None).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["b", "c", "d", "e"]));

        let mut itr = db.iterator(None, Some(b"c".as_slice())).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["a", "b"]));

        let mut itr = db.iterator(Some(b"bb".as_slice()), Some(b"d".as_slice())).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["c"]));
    }

    #[test]
    fn test_reverse_ranges() {
        let db = populated();

        let mut itr = db.reverse_iterator(None, None).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["e", "d", "c", "b", "a"]));

        // `end` is exclusive even though the descent starts on it.
        let mut itr = db.reverse_iterator(None, Some(b"d".as_slice())).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["c", "b", "a"]));

        let mut itr = db.reverse_iterator(Some(b"b".as_slice()), None).unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["e", "d", "c", "b"]));

        let mut itr = db
            .reverse_iterator(Some(b"b".as_slice()), Some(b"dd".as_slice()))
            .unwrap();
        assert_eq!(collect(itr.as_mut()), keys(&["d", "c", "b"]));

        let mut itr = db
            .reverse_iterator(Some(b"c".as_slice()), Some(b"c".as_slice()))
            .unwrap();
        assert!(collect(itr.as_mut()).is_empty());
    }

    #[test]
    fn test_iterator_sees_snapshot() {
        let db = populated();
        let mut itr = db.iterator(None, None).unwrap();

        db.set(b"aa", b"new").unwrap();
        db.delete(b"e").unwrap();

        assert_eq!(collect(itr.as_mut()), keys(&["a", "b", "c", "d", "e"]));
        assert_eq!(db.get(b"aa").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_writers_not_blocked_by_open_iterator() {
        let db = populated();
        let itr = db.iterator(None, None).unwrap();

        let writer = {
            let db = db.clone();
            std::thread::spawn(move || db.set(b"z", b"z"))
        };
        writer.join().unwrap().unwrap();

        assert!(itr.valid());
        assert_eq!(db.len(), 6);
    }

    #[test]
    fn test_stats() {
        let db = populated();
        let stats = db.stats();
        assert_eq!(stats["database.type"], "memDB");
        assert_eq!(stats["database.size"], "5");
    }

    #[test]
    fn test_close_keeps_entries() {
        let db = populated();
        db.close().unwrap();
        assert_eq!(db.get(b"a").unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn test_dump() {
        let db = MemDb::new();
        db.set(&[0x01], &[0xAB, 0xCD]).unwrap();
        db.set(&[0xFF, 0x00], b"").unwrap();

        let mut out = Vec::new();
        crate::dump(&db, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[01]:\t[ABCD]\n[FF00]:\t[]\n");
    }
}

use std::{collections::BTreeMap, iter, ops::Bound, path::Path};

use tracing::debug;

use super::{Cursor, Engine};
use crate::{
    batch::Operation,
    error::{DbError, DbResult},
};

/// [Engine] backed by a sled database.
#[derive(Debug)]
pub struct SledEngine {
    db: sled::Db,
}

impl SledEngine {
    pub fn new(db: sled::Db) -> Self {
        SledEngine { db }
    }

    /// Opens (or creates) the sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening sled database");

        Ok(SledEngine::new(sled::open(path)?))
    }

    /// Opens a sled database removed when dropped.
    pub fn temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(SledEngine::new(db))
    }

    fn flush_if(&self, sync: bool) -> DbResult<()> {
        if sync {
            self.db.flush()?;
        }

        Ok(())
    }
}

impl Engine for SledEngine {
    const NAME: &'static str = "sled";
    const ATOMIC_BATCH: bool = true;

    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> DbResult<()> {
        self.db.insert(key, value)?;
        self.flush_if(sync)
    }

    fn remove(&self, key: &[u8], sync: bool) -> DbResult<()> {
        self.db.remove(key)?;
        self.flush_if(sync)
    }

    fn cursor(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Cursor> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Ok(Box::new(iter::empty()));
            }
        }

        let lower = start.map_or(Bound::Unbounded, |start| Bound::Included(start.to_vec()));
        let upper = end.map_or(Bound::Unbounded, |end| Bound::Excluded(end.to_vec()));

        let entries = self.db.range::<Vec<u8>, _>((lower, upper)).map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(DbError::from)
        });

        if reverse {
            Ok(Box::new(entries.rev()))
        } else {
            Ok(Box::new(entries))
        }
    }

    fn write_batch(&self, ops: Vec<Operation>, sync: bool) -> DbResult<()> {
        let mut batch = sled::Batch::default();

        for op in ops {
            match op {
                Operation::Set { key, value } => batch.insert(key, value),
                Operation::Delete { key } => batch.remove(key),
            }
        }

        self.db.apply_batch(batch)?;
        self.flush_if(sync)
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::from([
            ("database.type".to_string(), Self::NAME.to_string()),
            ("database.size".to_string(), self.db.len().to_string()),
        ]);

        match self.db.size_on_disk() {
            Ok(bytes) => {
                stats.insert("database.disk_bytes".to_string(), bytes.to_string());
            }
            Err(err) => debug!(%err, "Failed to read the sled size on disk"),
        }

        stats
    }

    fn close(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

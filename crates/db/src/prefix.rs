use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::{
    batch::Batch,
    error::{DbError, DbResult},
    iterator::DbIterator,
    util::{check_bounds, check_key, hex, prefixed},
    Db,
};

/// Returns the smallest key greater than every key starting with `prefix`, or `None` when no
/// such key exists (empty or all-`0xFF` prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();

    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }

    None
}

/// Returns a forward iterator over every key of `db` starting with `prefix`. Keys are returned
/// as stored, prefix included.
pub fn iterate_prefix<D>(db: &D, prefix: &[u8]) -> DbResult<Box<dyn DbIterator>>
where
    D: Db + ?Sized,
{
    let start = (!prefix.is_empty()).then_some(prefix);
    let end = prefix_end(prefix);

    db.iterator(start, end.as_deref())
}

/// A view of a [Db] restricted to the keys starting with a fixed prefix.
///
/// Keys are logical: the prefix is prepended before reaching the source store and stripped
/// from the keys returned by iterators.
///
/// A [PrefixDb] does not own the source store: [Db::close] on the view is a no-op and the
/// source must be closed by its owner.
#[derive(Clone)]
pub struct PrefixDb {
    db: Arc<dyn Db>,
    prefix: Vec<u8>,
}

impl PrefixDb {
    /// Creates a new [PrefixDb] over `db`. An empty prefix gives a view of the whole store.
    pub fn new(db: Arc<dyn Db>, prefix: impl Into<Vec<u8>>) -> Self {
        PrefixDb {
            db,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the source store.
    pub fn source(&self) -> &Arc<dyn Db> {
        &self.db
    }

    fn key(&self, key: &[u8]) -> DbResult<Vec<u8>> {
        check_key(key)?;
        Ok(prefixed(&self.prefix, key))
    }

    /// Translates logical bounds into bounds of the source store covering the prefix only.
    fn bounds(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<(Option<Vec<u8>>, Option<Vec<u8>>)> {
        check_bounds(start, end)?;

        let start = match start {
            Some(start) => Some(prefixed(&self.prefix, start)),
            None if self.prefix.is_empty() => None,
            None => Some(self.prefix.clone()),
        };
        let end = match end {
            Some(end) => Some(prefixed(&self.prefix, end)),
            None => prefix_end(&self.prefix),
        };

        Ok((start, end))
    }
}

impl Db for PrefixDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.db.get(&self.key(key)?)
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        self.db.has(&self.key(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.db.set(&self.key(key)?, value)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.db.set_sync(&self.key(key)?, value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.db.delete(&self.key(key)?)
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.db.delete_sync(&self.key(key)?)
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        let (pstart, pend) = self.bounds(start, end)?;
        let source = self.db.iterator(pstart.as_deref(), pend.as_deref())?;

        Ok(Box::new(PrefixIterator::new(source, self.prefix.clone(), start, end)))
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        let (pstart, pend) = self.bounds(start, end)?;
        let source = self.db.reverse_iterator(pstart.as_deref(), pend.as_deref())?;

        Ok(Box::new(PrefixIterator::new(source, self.prefix.clone(), start, end)))
    }

    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(PrefixBatch {
            source: self.db.new_batch(),
            prefix: self.prefix.clone(),
        })
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::from([
            (
                "prefixdb.prefix.string".to_string(),
                String::from_utf8_lossy(&self.prefix).into_owned(),
            ),
            ("prefixdb.prefix.hex".to_string(), hex(&self.prefix)),
        ]);

        stats.extend(
            self.db
                .stats()
                .into_iter()
                .map(|(name, value)| (format!("prefixdb.source.{name}"), value)),
        );

        stats
    }

    fn close(&self) -> DbResult<()> {
        debug!(prefix = %hex(&self.prefix), "PrefixDb closed, source left open");
        Ok(())
    }
}

/// Iterator over a [PrefixDb], stripping the prefix from the source keys.
///
/// A source key without the prefix ends the iteration.
pub struct PrefixIterator {
    source: Box<dyn DbIterator>,
    prefix: Vec<u8>,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    valid: bool,
}

impl PrefixIterator {
    fn new(
        source: Box<dyn DbIterator>,
        prefix: Vec<u8>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Self {
        let mut itr = PrefixIterator {
            source,
            prefix,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            valid: false,
        };
        itr.update();

        itr
    }

    fn update(&mut self) {
        self.valid = self.source.valid() && self.source.key().starts_with(&self.prefix);
    }

    fn assert_valid(&self, op: &str) {
        if !self.valid {
            panic!("called {op}() on invalid iterator");
        }
    }
}

impl DbIterator for PrefixIterator {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn next(&mut self) {
        self.assert_valid("next");

        self.source.next();
        self.update();
    }

    fn key(&self) -> &[u8] {
        self.assert_valid("key");
        &self.source.key()[self.prefix.len()..]
    }

    fn value(&self) -> &[u8] {
        self.assert_valid("value");
        self.source.value()
    }

    fn error(&self) -> Option<&DbError> {
        self.source.error()
    }

    fn close(&mut self) -> DbResult<()> {
        self.valid = false;
        self.source.close()
    }
}

/// A [Batch] over the source store's batch, prefixing every key.
pub struct PrefixBatch {
    source: Box<dyn Batch>,
    prefix: Vec<u8>,
}

impl Batch for PrefixBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.source.set(&prefixed(&self.prefix, key), value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.source.delete(&prefixed(&self.prefix, key))
    }

    fn write(&mut self) -> DbResult<()> {
        self.source.write()
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.source.write_sync()
    }

    fn close(&mut self) -> DbResult<()> {
        self.source.close()
    }
}

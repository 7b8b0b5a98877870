#![allow(dead_code)]

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use kvdb::{BackendType, Db, DbIterator, Registry};
use tempfile::TempDir;

/// A store of every registered backend, each in its own temporary directory.
pub fn open_all(name: &str) -> Vec<(BackendType, Arc<dyn Db>, TempDir)> {
    let registry = Registry::with_defaults();

    registry
        .backends()
        .into_iter()
        .map(|backend| {
            let dir = tempfile::tempdir().unwrap();
            let db = registry.open(name, backend, dir.path()).unwrap();
            (backend, db, dir)
        })
        .collect()
}

pub fn check_valid(itr: &dyn DbIterator, expected: bool) {
    assert_eq!(itr.valid(), expected);
}

pub fn check_next(itr: &mut dyn DbIterator, expected: bool) {
    itr.next();
    assert!(itr.error().is_none());
    check_valid(itr, expected);
}

pub fn check_item(itr: &dyn DbIterator, key: &[u8], value: &[u8]) {
    assert_eq!(itr.key(), key);
    assert_eq!(itr.value(), value);
}

/// Checks that `itr` is invalid and that misusing it panics.
pub fn check_invalid(itr: &mut dyn DbIterator) {
    check_valid(itr, false);

    let key = panic::catch_unwind(AssertUnwindSafe(|| itr.key().to_vec()));
    assert!(key.is_err());
    let value = panic::catch_unwind(AssertUnwindSafe(|| itr.value().to_vec()));
    assert!(value.is_err());
    let next = panic::catch_unwind(AssertUnwindSafe(|| itr.next()));
    assert!(next.is_err());
}

/// Drains and closes `itr`.
pub fn entries(itr: &mut dyn DbIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut entries = Vec::new();
    while itr.valid() {
        entries.push((itr.key().to_vec(), itr.value().to_vec()));
        itr.next();
    }
    assert!(itr.error().is_none());
    itr.close().unwrap();

    entries
}

pub fn keys(itr: &mut dyn DbIterator) -> Vec<Vec<u8>> {
    entries(itr).into_iter().map(|(key, _)| key).collect()
}

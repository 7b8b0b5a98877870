mod common;

use std::sync::Arc;

use kvdb::{iterate_prefix, Db, PrefixDb};

use common::{check_invalid, check_item, check_next, entries, keys, open_all};

fn pairs(kvs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    kvs.iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

#[test]
fn test_iterate_prefix() {
    for (backend, db, _dir) in open_all("iterate_prefix") {
        for (k, v) in [("a/1", "x"), ("a/3", "y"), ("b/3", "z"), ("a-3", "w")] {
            db.set(k.as_bytes(), v.as_bytes()).unwrap();
        }

        let mut itr = iterate_prefix(db.as_ref(), b"a/").unwrap();
        check_item(itr.as_ref(), b"a/1", b"x");
        check_next(itr.as_mut(), true);
        check_item(itr.as_ref(), b"a/3", b"y");
        check_next(itr.as_mut(), false);
        check_invalid(itr.as_mut());
        assert!(itr.error().is_none(), "{backend}");
        itr.close().unwrap();
    }
}

#[test]
fn test_iterate_prefix_on_empty_store() {
    for (backend, db, _dir) in open_all("iterate_prefix_empty") {
        let mut itr = iterate_prefix(db.as_ref(), b"2").unwrap();
        check_invalid(itr.as_mut());
        assert!(itr.error().is_none(), "{backend}");
        itr.close().unwrap();
    }
}

#[test]
fn test_prefix_db() {
    for (backend, db, _dir) in open_all("prefix_db") {
        let stored = [("ke", "0"), ("keyA", "vA"), ("keyB", "vB"), ("keyC", "vC"), ("kez", "z")];
        for (k, v) in stored {
            db.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        let pdb = PrefixDb::new(db.clone(), "key");

        let mut itr = pdb.iterator(None, None).unwrap();
        assert_eq!(
            entries(itr.as_mut()),
            pairs(&[("A", "vA"), ("B", "vB"), ("C", "vC")]),
            "{backend}"
        );

        let mut itr = pdb.reverse_iterator(None, None).unwrap();
        assert_eq!(
            keys(itr.as_mut()),
            vec![b"C".to_vec(), b"B".to_vec(), b"A".to_vec()],
            "{backend}"
        );

        let mut itr = pdb.iterator(Some(b"B".as_slice()), Some(b"C".as_slice())).unwrap();
        assert_eq!(keys(itr.as_mut()), vec![b"B".to_vec()], "{backend}");

        let mut itr = pdb.reverse_iterator(Some(b"A".as_slice()), Some(b"C".as_slice())).unwrap();
        assert_eq!(keys(itr.as_mut()), vec![b"B".to_vec(), b"A".to_vec()], "{backend}");

        pdb.set(b"D", b"vD").unwrap();
        assert_eq!(db.get(b"keyD").unwrap(), Some(b"vD".to_vec()), "{backend}");
        pdb.delete(b"A").unwrap();
        assert!(!db.has(b"keyA").unwrap(), "{backend}");

        // Closing the view leaves the source usable.
        pdb.close().unwrap();
        assert!(db.has(b"kez").unwrap(), "{backend}");
    }
}

#[test]
fn test_nested_prefix_db() {
    for (backend, db, _dir) in open_all("nested_prefix") {
        let outer = PrefixDb::new(db.clone(), "app/");
        let inner = PrefixDb::new(Arc::new(outer.clone()), "users/");

        inner.set(b"alice", b"1").unwrap();
        outer.set(b"config", b"2").unwrap();

        assert_eq!(db.get(b"app/users/alice").unwrap(), Some(b"1".to_vec()), "{backend}");

        let mut itr = outer.iterator(None, None).unwrap();
        assert_eq!(
            keys(itr.as_mut()),
            vec![b"config".to_vec(), b"users/alice".to_vec()],
            "{backend}"
        );

        let mut itr = inner.iterator(None, None).unwrap();
        assert_eq!(entries(itr.as_mut()), pairs(&[("alice", "1")]), "{backend}");
    }
}

#[test]
fn test_prefix_batch() {
    for (backend, db, _dir) in open_all("prefix_batch") {
        db.set(b"p/old", b"1").unwrap();
        let pdb = PrefixDb::new(db.clone(), "p/");

        let mut batch = pdb.new_batch();
        batch.set(b"new", b"2").unwrap();
        batch.delete(b"old").unwrap();
        batch.write_sync().unwrap();

        let mut itr = db.iterator(None, None).unwrap();
        assert_eq!(entries(itr.as_mut()), pairs(&[("p/new", "2")]), "{backend}");
    }
}

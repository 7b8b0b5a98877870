use crate::error::{DbError, DbResult};

/// A cursor over a half-open key range `[start, end)` of a [crate::Db].
///
/// A forward iterator visits the keys of the range in increasing order. A reverse iterator is
/// created with the same `[start, end)` range and visits it in decreasing order, starting at
/// the greatest key `< end`.
///
/// An iterator is valid when positioned on an entry. Once it reports invalid (end of range or
/// traversal error) it never becomes valid again, whatever happens to the underlying store.
///
/// Calling [DbIterator::key], [DbIterator::value] or [DbIterator::next] on an invalid iterator
/// is a programming error and panics.
pub trait DbIterator: Send {
    /// Returns the `(start, end)` bounds the iterator was created with.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>);

    /// Returns `true` while the iterator is positioned on an entry.
    fn valid(&self) -> bool;

    /// Moves to the next entry in traversal order.
    ///
    /// Panics if the iterator is invalid.
    fn next(&mut self);

    /// Returns the key of the current entry.
    ///
    /// Panics if the iterator is invalid.
    fn key(&self) -> &[u8];

    /// Returns the value of the current entry.
    ///
    /// Panics if the iterator is invalid.
    fn value(&self) -> &[u8];

    /// Returns the error hit by the underlying traversal, if any. An iterator with an error is
    /// always invalid.
    fn error(&self) -> Option<&DbError>;

    /// Releases every resource held by the iterator. Idempotent.
    fn close(&mut self) -> DbResult<()>;
}

/// Returns `true` if `key` lies within `[start, end)`.
pub(crate) fn in_domain(key: &[u8], start: Option<&[u8]>, end: Option<&[u8]>) -> bool {
    start.map_or(true, |start| key >= start) && end.map_or(true, |end| key < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_domain() {
        assert!(in_domain(b"a", None, None));
        assert!(in_domain(b"a", Some(b"a".as_slice()), Some(b"b".as_slice())));
        assert!(!in_domain(b"b", Some(b"a".as_slice()), Some(b"b".as_slice())));
        assert!(!in_domain(b"0", Some(b"a".as_slice()), None));
        assert!(in_domain(b"zzz", Some(b"a".as_slice()), None));
    }
}

use std::fmt::Write;

use crate::error::{DbError, DbResult};

/// Formats `bytes` as uppercase hex.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02X}");
        s
    })
}

/// Rejects zero-length keys.
pub(crate) fn check_key(key: &[u8]) -> DbResult<()> {
    if key.is_empty() {
        return Err(DbError::KeyEmpty);
    }

    Ok(())
}

/// Rejects zero-length iterator bounds. `None` (unbounded) is always accepted.
pub(crate) fn check_bounds(start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<()> {
    if start.is_some_and(<[u8]>::is_empty) || end.is_some_and(<[u8]>::is_empty) {
        return Err(DbError::KeyEmpty);
    }

    Ok(())
}

/// Returns `prefix ++ key`.
pub(crate) fn prefixed(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(prefix.len() + key.len());
    v.extend_from_slice(prefix);
    v.extend_from_slice(key);

    v
}

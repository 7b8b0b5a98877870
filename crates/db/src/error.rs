use thiserror::Error;

use crate::util::hex;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("key cannot be empty")]
    KeyEmpty,
    #[error("batch has been written or closed")]
    BatchClosed,
    #[error("unknown db backend `{0}`")]
    UnknownBackend(String),
    #[error("transaction has already been committed or rolled back")]
    TransactionFinished,
    #[error("operation {index} failed, transaction rolled back: {source}")]
    RolledBack {
        index: usize,
        #[source]
        source: Box<DbError>,
    },
    #[error("rollback failed to delete key `{}` after `{cause}`: {source}", hex(.key))]
    RollbackFailed {
        key: Vec<u8>,
        cause: Box<DbError>,
        #[source]
        source: Box<DbError>,
    },
    #[error("iterator producer thread panicked")]
    ProducerPanicked,
    #[error("backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DbError {
    /// Wraps an opaque storage engine error.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DbError::Backend(err.into())
    }
}

impl From<sled::Error> for DbError {
    fn from(err: sled::Error) -> Self {
        DbError::backend(err)
    }
}

pub type DbResult<T> = Result<T, DbError>;

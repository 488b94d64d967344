use std::fmt::Display;

use thiserror::Error;

/// Errors returned by bucket and transaction operations.
///
/// Variants carry no source so the error can be cloned and compared; a
/// failed transaction hands the same error back on every call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoltError {
    #[error("bolt: key required")]
    KeyRequired,

    #[error("bolt: bucket name required")]
    BucketNameRequired,

    #[error("bolt: bucket not found")]
    BucketNotFound,

    #[error("bolt: bucket already exists")]
    BucketExists,

    #[error("bolt: incompatible value")]
    IncompatibleValue,

    #[error("bolt: tx not writable")]
    TxNotWritable,

    #[error("bolt: storage error: {0}")]
    Storage(String),

    #[error("bolt: corrupted entry: {0}")]
    Corrupted(String),
}

/// Result type for bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

pub(crate) fn storage<E: Display>(e: E) -> BoltError {
    BoltError::Storage(e.to_string())
}

//! Error types for InterchangeDB.

use thiserror::Error;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in InterchangeDB.
///
/// This enum represents every error that can occur in the database. By
/// having a single error type, we make error handling consistent across
/// every layer — block manager, B-tree, cache, transactions, and LSM.
#[derive(Debug, Error)]
pub enum Error {
    /// Logical absence: key not present, cursor past end.
    #[error("not found")]
    NotFound,

    /// A non-overwrite insert found an existing key.
    #[error("duplicate key")]
    DuplicateKey,

    /// Caller should retry the operation (observed a `Ref` in `Split`, or
    /// the parent index changed mid-traversal).
    #[error("restart")]
    Restart,

    /// Resource currently held exclusively; caller may retry.
    #[error("busy")]
    Busy,

    /// On-disk structure failed an integrity check. Never recoverable for
    /// this object.
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// Invariants violated such that the database cannot continue. Once
    /// raised, every subsequent API call on the connection returns this.
    #[error("panic: {0}")]
    Panic(String),

    /// Block manager or log allocation failed.
    #[error("out of space")]
    OutOfSpace,

    /// A bounded wait exceeded its deadline (compaction `max_time`).
    #[error("timeout")]
    Timeout,

    /// Mutating call on a read-only handle.
    #[error("read-only handle")]
    ReadOnly,

    /// On-disk format version outside the supported range.
    #[error("version mismatch: found {major}.{minor}")]
    VersionMismatch { major: u16, minor: u16 },

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., exceeds max pages).
    #[error("invalid page id: {0}")]
    InvalidPageId(u32),

    /// Buffer pool is at maximum capacity.
    #[error("buffer pool is full")]
    BufferPoolFull,

    /// Attempted to unpin a page that wasn't pinned.
    #[error("page {0} is not pinned")]
    PageNotPinned(u32),

    /// An address cookie references a location past the end of the file.
    #[error("address out of range")]
    AddressOutOfRange,

    /// A single node's serialized cells don't fit in one page. This crate's
    /// B-tree has no overflow-page path, so a record (or a node that can't
    /// be split small enough) this large cannot be stored.
    #[error("record of {size} bytes exceeds page capacity of {capacity} bytes")]
    RecordTooLarge { size: usize, capacity: usize },

    /// Transaction rolled back (own write observed, or reader saw an
    /// aborted update).
    #[error("aborted transaction")]
    AbortedTransaction,

    /// Configuration string failed to parse.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying file-system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors a caller may retry without giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Restart | Error::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "no free frames available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }
        assert_eq!(might_fail().unwrap(), 42);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Restart.is_retryable());
        assert!(Error::Busy.is_retryable());
        assert!(!Error::Corrupt("x".into()).is_retryable());
    }
}

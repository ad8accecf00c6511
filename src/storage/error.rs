//! Storage layer error types.

use crate::catalog::TableId;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Page bytes could not be decoded against the table schema.
    #[error("malformed page data: {0}")]
    Format(String),

    /// No free slot remains on the page.
    #[error("page {0} is full")]
    PageFull(PageId),

    /// The delete target is absent, or its record id names another page.
    #[error("tuple not present")]
    TupleNotFound,

    /// A page id was handed to a heap file from a different table.
    #[error("page {pid} does not belong to table {table:#x}")]
    WrongTable { pid: PageId, table: TableId },

    /// No heap file is registered under this table id.
    #[error("unknown table {0:#x}")]
    UnknownTable(TableId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocked page request was aborted; the caller must roll back.
    #[error("transaction {0} aborted while waiting for a page lock")]
    TransactionAborted(TransactionId),

    /// Eviction could not free a cache slot.
    #[error("buffer pool is full: no page could be evicted")]
    BufferPoolFull {
        #[source]
        cause: Option<std::io::Error>,
    },

    /// `next()` was called on an exhausted scan cursor.
    #[error("no remaining tuples in scan")]
    ScanExhausted,

    /// The scan cursor was used without being opened.
    #[error("scan cursor is closed")]
    ScanClosed,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

use thiserror::Error;

use super::types::{PageId, RecordId, TableId, TransactionId};

/// Broad classification of a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller passed a page, table, slot or tuple that does not exist. Not retryable.
    InvalidReference,
    /// The buffer pool could not make room for another page.
    Capacity,
    /// Reading or writing a backing file failed.
    Io,
    /// The transaction gave up waiting for a lock and must be aborted.
    Aborted,
    /// Rolling back a page during abort failed.
    Recovery,
}

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Buffer pool is full, every resident page is dirty")]
    BufferPoolFull,

    #[error("Invalid slot ID {slot} (page has {num_slots} slots)")]
    InvalidSlotId { slot: u32, num_slots: usize },

    #[error("Page {0} is full")]
    PageFull(PageId),

    #[error("No such tuple: {0}")]
    NoSuchTuple(RecordId),

    #[error("Tuple {record_id} does not belong to page {page_id}")]
    TupleNotOnPage { record_id: RecordId, page_id: PageId },

    #[error("Tuple has no record ID")]
    MissingRecordId,

    #[error("Tuple does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Transaction {0} aborted while waiting for a lock")]
    TransactionAborted(TransactionId),

    #[error("Failed to restore page {page_id} during abort: {source}")]
    RecoveryFailed {
        page_id: PageId,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Corrupted log record: {0}")]
    CorruptedLog(String),
}

impl StorageError {
    /// Returns the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Io(_) => ErrorKind::Io,
            StorageError::CorruptedLog(_) => ErrorKind::Io,
            StorageError::BufferPoolFull | StorageError::PageFull(_) => ErrorKind::Capacity,
            StorageError::TransactionAborted(_) => ErrorKind::Aborted,
            StorageError::RecoveryFailed { .. } => ErrorKind::Recovery,
            StorageError::PageNotFound(_)
            | StorageError::TableNotFound(_)
            | StorageError::InvalidSlotId { .. }
            | StorageError::NoSuchTuple(_)
            | StorageError::TupleNotOnPage { .. }
            | StorageError::MissingRecordId
            | StorageError::SchemaMismatch(_) => ErrorKind::InvalidReference,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

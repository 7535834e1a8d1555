//! Write-ahead log collaborator.
//!
//! The buffer pool reports every page it commits or flushes as an update
//! record pairing the page's before-image with its current bytes, then
//! forces the log before touching the data file.

mod file_log;
mod memory_log;

pub use file_log::*;
pub use memory_log::*;

use bytes::Bytes;

use crate::common::{PageId, Result, TransactionId};

/// One before/after page image pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub txn: TransactionId,
    pub page_id: PageId,
    pub before: Bytes,
    pub after: Bytes,
}

/// Sink for update records.
pub trait LogWriter: Send + Sync {
    /// Appends an update record for `page_id` written by `txn`.
    fn log_write(
        &self,
        txn: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()>;

    /// Returns once every record appended so far is durable.
    fn force(&self) -> Result<()>;
}

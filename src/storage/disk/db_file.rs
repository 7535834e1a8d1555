use std::sync::Arc;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{PageId, Result, TableId, TransactionId};
use crate::storage::page::HeapPage;
use crate::tuple::{Schema, Tuple};

/// The file-access capability the buffer pool resolves by table ID.
///
/// Tuple mutations receive the buffer pool explicitly and fetch every page
/// they touch through it, so locking and in-flight changes are respected.
/// Implementations mark every page they modify dirty by `txn` before
/// dropping its write guard, since a page that looks clean may be evicted,
/// and return those pages.
pub trait DbFile: Send + Sync {
    /// Returns the table ID of this file.
    fn id(&self) -> TableId;

    /// Returns the schema of the tuples stored in this file.
    fn schema(&self) -> &Arc<Schema>;

    /// Reads a page straight from disk, bypassing the buffer pool.
    fn read_page(&self, page_id: PageId) -> Result<HeapPage>;

    /// Overwrites a page on disk.
    fn write_page(&self, page: &HeapPage) -> Result<()>;

    /// Returns the number of pages currently in the file.
    fn num_pages(&self) -> Result<u32>;

    /// Adds a tuple to the file on behalf of `txn`.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>>;

    /// Removes the tuple identified by `tuple.record_id()` on behalf of `txn`.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>>;
}

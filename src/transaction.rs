use std::sync::Arc;

use log::warn;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{PageId, Permissions, Result, TableId, TransactionId};
use crate::tuple::Tuple;

/// RAII handle for one transaction.
///
/// `commit` and `abort` consume the handle. A handle dropped without either
/// is aborted so its locks are never leaked.
pub struct Transaction {
    id: TransactionId,
    pool: Arc<BufferPool>,
    completed: bool,
}

impl Transaction {
    /// Starts a transaction with a fresh ID.
    pub fn begin(pool: Arc<BufferPool>) -> Self {
        Self {
            id: TransactionId::next(),
            pool,
            completed: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn get_page(&self, page_id: PageId, perm: Permissions) -> Result<PageRef> {
        self.pool.get_page(self.id, page_id, perm)
    }

    pub fn insert_tuple(&self, table_id: TableId, tuple: &Tuple) -> Result<()> {
        self.pool.insert_tuple(self.id, table_id, tuple)
    }

    pub fn delete_tuple(&self, tuple: &Tuple) -> Result<()> {
        self.pool.delete_tuple(self.id, tuple)
    }

    pub fn commit(mut self) -> Result<()> {
        self.complete(true)
    }

    pub fn abort(mut self) -> Result<()> {
        self.complete(false)
    }

    fn complete(&mut self, commit: bool) -> Result<()> {
        self.completed = true;
        self.pool.transaction_complete(self.id, commit)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Err(e) = self.complete(false) {
            warn!("implicit abort of {} failed: {}", self.id, e);
        }
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{PageId, Permissions, Result, TransactionId};
use crate::tuple::Tuple;

use super::DbFile;

/// Position of an open scan.
struct Cursor {
    next_page: u32,
    num_pages: u32,
    buffered: VecDeque<Tuple>,
}

/// Full-table scan over a heap file.
///
/// Visits pages `0..num_pages` in order and, within a page, occupied slots in
/// ascending order. Every page is fetched through the buffer pool with
/// read-only permissions, so the scan sees uncommitted changes of its own
/// transaction and blocks behind other transactions' exclusive locks. The page
/// count is sampled when the scan is opened.
pub struct HeapScan<'a> {
    file: Arc<dyn DbFile>,
    pool: &'a BufferPool,
    txn: TransactionId,
    cursor: Option<Cursor>,
}

impl<'a> HeapScan<'a> {
    /// Creates a closed scan. Call [`open`](Self::open) before reading.
    pub fn new(file: Arc<dyn DbFile>, pool: &'a BufferPool, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            cursor: None,
        }
    }

    /// Positions the scan before the first tuple of page 0.
    pub fn open(&mut self) -> Result<()> {
        self.cursor = Some(Cursor {
            next_page: 0,
            num_pages: self.file.num_pages()?,
            buffered: VecDeque::new(),
        });
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    /// Returns the next tuple, or `None` when exhausted or closed.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        loop {
            if let Some(tuple) = cursor.buffered.pop_front() {
                return Ok(Some(tuple));
            }
            if cursor.next_page >= cursor.num_pages {
                return Ok(None);
            }
            let page_id = PageId::new(self.file.id(), cursor.next_page);
            let page = self.pool.get_page(self.txn, page_id, Permissions::ReadOnly)?;
            cursor.buffered.extend(page.read().tuples().cloned());
            cursor.next_page += 1;
        }
    }

    /// Restarts the scan from page 0.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.cursor = None;
    }
}

impl Iterator for HeapScan<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::common::{
    BufferPoolConfig, PageId, Permissions, Result, StorageError, TableId, TransactionId,
};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;
use crate::wal::LogWriter;

use super::{LockManager, LruKReplacer};

/// Shared handle to a resident page.
///
/// Readers take `read()`. Mutating a page through `write()` is only allowed
/// while holding its exclusive lock, i.e. after fetching it with
/// [`Permissions::ReadWrite`].
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Resident pages and their replacement state
struct PoolState {
    /// Page table: maps page IDs to resident pages
    pages: HashMap<PageId, PageRef>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
}

/// BufferPool is the only path through which transactions read or modify
/// pages. It caches at most `num_pages` pages, takes page locks on behalf of
/// transactions, loads missing pages from their table's file, and commits or
/// rolls back each transaction's dirty pages.
///
/// Dirty pages are never evicted: if every resident page is dirty, a request
/// that needs a free slot fails with [`StorageError::BufferPoolFull`]. Among
/// clean pages the victim is chosen by LRU-K.
///
/// Lock order: a thread never takes the page-table mutex while holding a
/// page's `RwLock`.
pub struct BufferPool {
    config: BufferPoolConfig,
    state: Mutex<PoolState>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogWriter>,
}

impl BufferPool {
    /// Creates a buffer pool resolving files through `catalog` and logging
    /// page images to `log`.
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>, log: Arc<dyn LogWriter>) -> Self {
        let replacer = LruKReplacer::new(config.lru_k);
        Self {
            config,
            state: Mutex::new(PoolState {
                pages: HashMap::new(),
                replacer,
            }),
            lock_manager: LockManager::new(),
            catalog,
            log,
        }
    }

    /// Fetches a page on behalf of `txn`, blocking until the lock implied by
    /// `perm` is granted.
    ///
    /// Every caller sees the same in-memory instance of a page until it is
    /// evicted or discarded. A miss reads the page without holding the page
    /// table, and only evicts once the read has succeeded.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageRef> {
        self.lock_manager
            .acquire_blocking(txn, page_id, perm.into(), self.config.lock_timeout)?;

        if let Some(page) = Self::cached(&mut self.state.lock(), page_id) {
            return Ok(page);
        }

        let file = self.catalog.database_file(page_id.table_id)?;
        let loaded = file.read_page(page_id)?;

        let mut state = self.state.lock();
        // Another holder of a compatible lock may have loaded it meanwhile.
        if let Some(page) = Self::cached(&mut state, page_id) {
            return Ok(page);
        }
        if state.pages.len() >= self.config.num_pages {
            self.evict_page(&mut state)?;
        }
        let page = Arc::new(RwLock::new(loaded));
        state.pages.insert(page_id, Arc::clone(&page));
        state.replacer.record_access(page_id);
        debug!("loaded {} for {}", page_id, txn);
        Ok(page)
    }

    fn cached(state: &mut PoolState, page_id: PageId) -> Option<PageRef> {
        let page = state.pages.get(&page_id).cloned()?;
        state.replacer.record_access(page_id);
        Some(page)
    }

    /// Releases `txn`'s lock on a page before the transaction ends.
    ///
    /// This breaks two-phase locking; it exists for recovery code only.
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.release(txn, page_id)
    }

    /// Returns true if `txn` holds a lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(txn, page_id)
    }

    /// Adds `tuple` to table `table_id` and marks the pages it touched dirty.
    pub fn insert_tuple(&self, txn: TransactionId, table_id: TableId, tuple: &Tuple) -> Result<()> {
        let file = self.catalog.database_file(table_id)?;
        let dirtied = file.insert_tuple(self, txn, tuple)?;
        self.add_dirtied(txn, dirtied)
    }

    /// Removes `tuple` from its table and marks the pages it touched dirty.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self.catalog.database_file(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, txn, tuple)?;
        self.add_dirtied(txn, dirtied)
    }

    /// Marks `pages` dirty by `txn` and makes them the resident copies,
    /// replacing whatever is cached under the same ID.
    fn add_dirtied(&self, txn: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(Some(txn));
                guard.page_id()
            };

            let mut state = self.state.lock();
            let resident = state
                .pages
                .get(&page_id)
                .map(|cached| Arc::ptr_eq(cached, &page));
            match resident {
                Some(true) => {}
                Some(false) => {
                    state.pages.insert(page_id, page);
                }
                None => {
                    if state.pages.len() >= self.config.num_pages {
                        self.evict_page(&mut state)?;
                    }
                    state.pages.insert(page_id, page);
                }
            }
            state.replacer.record_access(page_id);
        }
        Ok(())
    }

    /// Commits or aborts `txn`, then releases every lock it holds.
    ///
    /// On commit each page dirtied by `txn` is logged (before-image and
    /// current bytes), the log is forced, and the current bytes become the
    /// page's new before-image. The page stays dirty until flushed.
    ///
    /// On abort each page dirtied by `txn` is reloaded from its file,
    /// discarding the uncommitted changes. A page that cannot be reloaded is
    /// reported as [`StorageError::RecoveryFailed`]; locks are still released.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let dirtied = self.pages_dirtied_by(txn);
        let result = if commit {
            self.commit_pages(txn, &dirtied)
        } else {
            self.rollback_pages(txn, &dirtied)
        };

        let released = self.lock_manager.release_all(txn);
        debug!(
            "{} {} ({} dirty pages, {} locks released)",
            txn,
            if commit { "committed" } else { "aborted" },
            dirtied.len(),
            released.len()
        );
        result
    }

    fn commit_pages(&self, txn: TransactionId, dirtied: &[PageRef]) -> Result<()> {
        for page in dirtied {
            let mut guard = page.write();
            self.log
                .log_write(txn, guard.page_id(), guard.before_image(), &guard.to_bytes())?;
            self.log.force()?;
            guard.set_before_image();
        }
        Ok(())
    }

    fn rollback_pages(&self, txn: TransactionId, dirtied: &[PageRef]) -> Result<()> {
        let mut first_error = None;
        for page in dirtied {
            let page_id = page.read().page_id();
            let fresh = self
                .catalog
                .database_file(page_id.table_id)
                .and_then(|file| file.read_page(page_id));
            match fresh {
                Ok(fresh) => *page.write() = fresh,
                Err(e) => {
                    warn!("{} could not restore {}: {}", txn, page_id, e);
                    first_error.get_or_insert(StorageError::RecoveryFailed {
                        page_id,
                        source: Box::new(e),
                    });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Snapshot of the resident pages currently dirtied by `txn`. Dirty
    /// pages are never evicted, so the set cannot shrink underneath a commit.
    fn pages_dirtied_by(&self, txn: TransactionId) -> Vec<PageRef> {
        self.resident()
            .into_iter()
            .filter(|page| page.read().dirtier() == Some(txn))
            .collect()
    }

    fn resident(&self) -> Vec<PageRef> {
        self.state.lock().pages.values().cloned().collect()
    }

    /// Writes a resident page to its file if it is dirty, logging it first.
    /// Returns whether anything was written. The page stays resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let page = self.state.lock().pages.get(&page_id).cloned();
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(false),
        }
    }

    /// Flushes every dirty resident page.
    ///
    /// This writes uncommitted data to disk; later aborts of the owning
    /// transactions will reload those bytes rather than the committed ones.
    pub fn flush_all_pages(&self) -> Result<()> {
        for page in self.resident() {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Flushes every resident page dirtied by `txn`.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        for page in self.pages_dirtied_by(txn) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    fn write_back(&self, page: &PageRef) -> Result<bool> {
        let mut guard = page.write();
        let Some(dirtier) = guard.dirtier() else {
            return Ok(false);
        };
        let page_id = guard.page_id();

        self.log
            .log_write(dirtier, page_id, guard.before_image(), &guard.to_bytes())?;
        self.log.force()?;
        self.catalog.database_file(page_id.table_id)?.write_page(&guard)?;

        // Only cleared once the write succeeded, so a failed flush can be retried.
        guard.mark_dirty(None);
        debug!("flushed {}", page_id);
        Ok(true)
    }

    /// Drops a page from the pool without writing it back.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        state.pages.remove(&page_id);
        state.replacer.remove(&page_id);
    }

    /// Frees one slot by dropping a clean page.
    ///
    /// Pages being written right now are skipped along with dirty ones.
    fn evict_page(&self, state: &mut PoolState) -> Result<()> {
        let PoolState { pages, replacer } = state;
        let victim = replacer
            .evict(|page_id| {
                pages.get(page_id).is_some_and(|page| {
                    page.try_read().is_some_and(|guard| !guard.is_dirty())
                })
            })
            .ok_or(StorageError::BufferPoolFull)?;

        pages.remove(&victim);
        debug!("evicted {}", victim);
        Ok(())
    }

    /// Returns the number of resident pages.
    pub fn resident_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Returns the maximum number of resident pages.
    pub fn capacity(&self) -> usize {
        self.config.num_pages
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn log_writer(&self) -> &Arc<dyn LogWriter> {
        &self.log
    }
}

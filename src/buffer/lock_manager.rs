use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::{LockMode, PageId, Result, StorageError, TransactionId};

/// One transaction's lock on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockHolder {
    txn: TransactionId,
    mode: LockMode,
}

/// Lock state guarded by the manager's mutex.
///
/// For every page the holder list is either a set of Shared holders or a
/// single Exclusive holder; pages with no holders have no entry.
#[derive(Debug, Default)]
struct LockTable {
    holders: HashMap<PageId, Vec<LockHolder>>,
    /// Reverse index so a finishing transaction can drop all of its locks
    held_by_txn: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    /// Applies the admission rules. Grants (recording the holder) and returns
    /// true, or returns false leaving the table untouched.
    fn try_grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let holders = self.holders.entry(page_id).or_default();

        if let Some(pos) = holders.iter().position(|h| h.txn == txn) {
            let held = holders[pos].mode;
            if held.covers(mode) {
                return true;
            }
            // Shared -> Exclusive upgrade, only for the sole holder.
            if holders.len() == 1 {
                holders[pos].mode = LockMode::Exclusive;
                return true;
            }
            return false;
        }

        let granted = match mode {
            LockMode::Shared => holders.iter().all(|h| h.mode == LockMode::Shared),
            LockMode::Exclusive => holders.is_empty(),
        };
        if granted {
            holders.push(LockHolder { txn, mode });
            self.held_by_txn.entry(txn).or_default().insert(page_id);
        } else if holders.is_empty() {
            self.holders.remove(&page_id);
        }
        granted
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let Some(holders) = self.holders.get_mut(&page_id) else {
            return false;
        };
        let before = holders.len();
        holders.retain(|h| h.txn != txn);
        let released = holders.len() != before;
        if holders.is_empty() {
            self.holders.remove(&page_id);
        }
        if released {
            if let Some(pages) = self.held_by_txn.get_mut(&txn) {
                pages.remove(&page_id);
                if pages.is_empty() {
                    self.held_by_txn.remove(&txn);
                }
            }
        }
        released
    }
}

/// Page-level shared/exclusive locks for strict two-phase locking.
///
/// [`acquire`](Self::acquire) is a pure admission decision and never blocks.
/// [`acquire_blocking`](Self::acquire_blocking) re-evaluates the same
/// decision every time a lock is released until it is granted or the
/// optional timeout expires. There is no deadlock detection: two
/// transactions waiting on each other block until one of them times out.
pub struct LockManager {
    table: Mutex<LockTable>,
    /// Signalled whenever a lock is released
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
        }
    }

    /// Tries to take a lock on `page_id` for `txn`. Returns whether it was granted.
    ///
    /// - no holders: granted;
    /// - `txn` already holds a lock that covers `mode`: granted;
    /// - `txn` holds Shared and wants Exclusive: upgraded only if it is the sole holder;
    /// - otherwise Shared joins an all-Shared holder set and Exclusive needs no holders.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.table.lock().try_grant(txn, page_id, mode)
    }

    /// Waits until the lock is granted. With a timeout, gives up after it
    /// elapses and reports the transaction as aborted.
    pub fn acquire_blocking(
        &self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut table = self.table.lock();
        loop {
            if table.try_grant(txn, page_id, mode) {
                trace!("{} granted {:?} on {}", txn, mode, page_id);
                return Ok(());
            }
            trace!("{} waiting for {:?} on {}", txn, mode, page_id);
            match deadline {
                None => self.released.wait(&mut table),
                Some(deadline) => {
                    if self.released.wait_until(&mut table, deadline).timed_out()
                        && !table.try_grant(txn, page_id, mode)
                    {
                        warn!("{} timed out waiting for {:?} on {}", txn, mode, page_id);
                        return Err(StorageError::TransactionAborted(txn));
                    }
                }
            }
        }
    }

    /// Drops `txn`'s lock on `page_id`. Returns whether a lock was held.
    pub fn release(&self, txn: TransactionId, page_id: PageId) -> bool {
        let released = self.table.lock().release(txn, page_id);
        if released {
            self.released.notify_all();
        }
        released
    }

    /// Drops every lock `txn` holds and returns the pages that were unlocked.
    pub fn release_all(&self, txn: TransactionId) -> Vec<PageId> {
        let pages: Vec<PageId> = {
            let mut table = self.table.lock();
            let pages: Vec<PageId> = table
                .held_by_txn
                .get(&txn)
                .map(|pages| pages.iter().copied().collect())
                .unwrap_or_default();
            for &page_id in &pages {
                table.release(txn, page_id);
            }
            pages
        };
        if !pages.is_empty() {
            self.released.notify_all();
        }
        pages
    }

    /// Returns true if `txn` holds any lock on `page_id`.
    pub fn holds(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(txn, page_id).is_some()
    }

    /// Returns the mode `txn` holds on `page_id`, if any.
    pub fn lock_mode(&self, txn: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table
            .lock()
            .holders
            .get(&page_id)
            .and_then(|holders| holders.iter().find(|h| h.txn == txn))
            .map(|h| h.mode)
    }

    /// Returns the current holders of `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<(TransactionId, LockMode)> {
        self.table
            .lock()
            .holders
            .get(&page_id)
            .map(|holders| holders.iter().map(|h| (h.txn, h.mode)).collect())
            .unwrap_or_default()
    }

    /// Returns every page `txn` holds a lock on.
    pub fn pages_locked_by(&self, txn: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .held_by_txn
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

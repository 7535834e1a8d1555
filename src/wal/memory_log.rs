use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::common::{PageId, Result, TransactionId};

use super::{LogWriter, UpdateRecord};

/// In-memory log, for tests and for pools that do not need durability.
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<UpdateRecord>>,
    forces: AtomicUsize,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record logged so far.
    pub fn records(&self) -> Vec<UpdateRecord> {
        self.records.lock().clone()
    }

    /// Returns the records logged by `txn`.
    pub fn records_for(&self, txn: TransactionId) -> Vec<UpdateRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.txn == txn)
            .cloned()
            .collect()
    }

    /// Returns how many times the log was forced.
    pub fn force_count(&self) -> usize {
        self.forces.load(Ordering::Relaxed)
    }
}

impl LogWriter for MemoryLog {
    fn log_write(
        &self,
        txn: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()> {
        self.records.lock().push(UpdateRecord {
            txn,
            page_id,
            before: Bytes::copy_from_slice(before),
            after: Bytes::copy_from_slice(after),
        });
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.forces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    #[test]
    fn test_memory_log_collects_records() {
        let log = MemoryLog::new();
        let (t1, t2) = (TransactionId::next(), TransactionId::next());
        let pid = PageId::new(TableId::new(1), 0);

        log.log_write(t1, pid, b"a", b"b").unwrap();
        log.log_write(t2, pid, b"b", b"c").unwrap();
        log.force().unwrap();

        assert_eq!(log.records().len(), 2);
        assert_eq!(log.records_for(t1)[0].after.as_ref(), b"b");
        assert_eq!(log.force_count(), 1);
    }
}

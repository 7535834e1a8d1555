use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::common::{PageId, Result, StorageError, TableId, TransactionId};

use super::{LogWriter, UpdateRecord};

/// Record header: txn (8) + table (4) + page (4) + before len (4) + after len (4)
const RECORD_HEADER_SIZE: usize = 24;

/// Append-only log file of update records.
///
/// Record layout, all integers little-endian:
///
/// | Field       | Size |
/// |-------------|------|
/// | txn         | 8    |
/// | table_id    | 4    |
/// | page_no     | 4    |
/// | before_len  | 4    |
/// | after_len   | 4    |
/// | before      | var  |
/// | after       | var  |
pub struct FileLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl FileLog {
    /// Opens the log at `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes every record in the log file at `path`.
    pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<UpdateRecord>> {
        let mut buf = Bytes::from(fs::read(path)?);
        let mut records = Vec::new();

        while buf.has_remaining() {
            if buf.remaining() < RECORD_HEADER_SIZE {
                return Err(StorageError::CorruptedLog(format!(
                    "truncated header after {} records",
                    records.len()
                )));
            }
            let txn = TransactionId::from_raw(buf.get_u64_le());
            let table_id = TableId::new(buf.get_u32_le());
            let page_no = buf.get_u32_le();
            let before_len = buf.get_u32_le() as usize;
            let after_len = buf.get_u32_le() as usize;
            if buf.remaining() < before_len + after_len {
                return Err(StorageError::CorruptedLog(format!(
                    "truncated images after {} records",
                    records.len()
                )));
            }
            let before = buf.split_to(before_len);
            let after = buf.split_to(after_len);
            records.push(UpdateRecord {
                txn,
                page_id: PageId::new(table_id, page_no),
                before,
                after,
            });
        }

        Ok(records)
    }

    fn encode(txn: TransactionId, page_id: PageId, before: &[u8], after: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE + before.len() + after.len());
        buf.put_u64_le(txn.as_u64());
        buf.put_u32_le(page_id.table_id.as_u32());
        buf.put_u32_le(page_id.page_no);
        buf.put_u32_le(before.len() as u32);
        buf.put_u32_le(after.len() as u32);
        buf.put_slice(before);
        buf.put_slice(after);
        buf
    }
}

impl LogWriter for FileLog {
    fn log_write(
        &self,
        txn: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()> {
        let record = Self::encode(txn, page_id, before, after);
        self.writer.lock().write_all(&record)?;
        Ok(())
    }

    fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

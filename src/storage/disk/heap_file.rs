use std::fs::{File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{
    page_size, PageId, Permissions, Result, StorageError, TableId, TransactionId,
};
use crate::storage::page::HeapPage;
use crate::tuple::{Schema, Tuple};

use super::DbFile;

/// HeapFile stores one table's tuples, in no particular order, in a single
/// file of fixed-size pages. Page `n` occupies bytes
/// `[n * page_size, (n + 1) * page_size)` and the file length is always a
/// whole number of pages. The file only grows, one empty page at a time.
pub struct HeapFile {
    id: TableId,
    schema: Arc<Schema>,
    file: Mutex<File>,
    path: PathBuf,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl HeapFile {
    /// Opens (creating if needed) the heap file at `path`. The table ID is the
    /// CRC-32C of the canonical path, so it is stable across runs and builds.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<Schema>) -> Result<Self> {
        let file = Self::open_file(path.as_ref())?;
        let canonical = path.as_ref().canonicalize()?;
        let id = Self::path_table_id(&canonical);
        Ok(Self::from_parts(id, schema, file, canonical))
    }

    fn path_table_id(canonical: &Path) -> TableId {
        TableId::new(crc32c::crc32c(canonical.to_string_lossy().as_bytes()))
    }

    /// Opens (creating if needed) the heap file at `path` under an explicit table ID.
    pub fn with_id<P: AsRef<Path>>(path: P, schema: Arc<Schema>, id: TableId) -> Result<Self> {
        let file = Self::open_file(path.as_ref())?;
        Ok(Self::from_parts(id, schema, file, path.as_ref().to_path_buf()))
    }

    fn open_file(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(file)
    }

    fn from_parts(id: TableId, schema: Arc<Schema>, file: File, path: PathBuf) -> Self {
        Self {
            id,
            schema,
            file: Mutex::new(file),
            path,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        }
    }

    /// Appends one zeroed page and returns its ID.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let page_size = page_size();
        let mut file = self.file.lock();
        let page_no = (file.metadata()?.len() / page_size as u64) as u32;
        let page_id = PageId::new(self.id, page_no);

        file.seek(SeekFrom::Start(page_id.offset(page_size)))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        debug!("appended empty page {}", page_id);
        Ok(page_id)
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes buffered writes to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.id {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_table(page_id)?;
        let page_size = page_size();
        let mut data = vec![0u8; page_size];
        {
            let mut file = self.file.lock();
            let len = file.metadata()?.len();
            if page_id.offset(page_size) + page_size as u64 > len {
                return Err(StorageError::PageNotFound(page_id));
            }
            file.seek(SeekFrom::Start(page_id.offset(page_size)))?;
            file.read_exact(&mut data).map_err(|e| match e.kind() {
                IoErrorKind::UnexpectedEof => StorageError::PageNotFound(page_id),
                _ => StorageError::Io(e),
            })?;
        }
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        HeapPage::from_bytes(page_id, self.schema.clone(), &data)
    }

    fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        self.check_table(page_id)?;
        let data = page.to_bytes();

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.offset(data.len())))?;
        file.write_all(&data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / page_size() as u64) as u32)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple ({}) does not match table {} ({})",
                tuple.schema(),
                self.id,
                self.schema
            )));
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.id, page_no);
            let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
            let inserted = {
                let mut guard = page.write();
                if guard.free_slot_count() > 0 {
                    guard.insert_tuple(tuple)?;
                    guard.mark_dirty(Some(txn));
                    true
                } else {
                    false
                }
            };
            if inserted {
                return Ok(vec![page]);
            }
        }

        let page_id = self.append_empty_page()?;
        let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.insert_tuple(tuple)?;
            guard.mark_dirty(Some(txn));
        }
        Ok(vec![page])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if record_id.page_id.table_id != self.id || record_id.page_id.page_no >= self.num_pages()? {
            return Err(StorageError::NoSuchTuple(record_id));
        }

        let page = pool.get_page(txn, record_id.page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(Some(txn));
        }
        Ok(vec![page])
    }
}

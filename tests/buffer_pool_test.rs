//! Integration tests for the buffer pool

use std::path::Path;
use std::sync::Arc;

use heapstore::buffer::BufferPool;
use heapstore::catalog::Catalog;
use heapstore::common::{
    BufferPoolConfig, ErrorKind, PageId, Permissions, StorageError, TableId, TransactionId,
};
use heapstore::storage::{DbFile, HeapFile, HeapScan};
use heapstore::tuple::{DataType, Schema, Tuple, TupleBuilder};
use heapstore::wal::MemoryLog;
use tempfile::TempDir;

const TABLE: TableId = TableId(7);

fn schema() -> Arc<Schema> {
    Schema::builder()
        .column("k", DataType::Integer)
        .column("v", DataType::Integer)
        .build_arc()
}

fn open_table(path: &Path) -> Arc<HeapFile> {
    Arc::new(HeapFile::with_id(path, schema(), TABLE).unwrap())
}

fn create_pool(file: Arc<HeapFile>, num_pages: usize) -> BufferPool {
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(file, "kv");
    BufferPool::new(BufferPoolConfig::new(num_pages), catalog, Arc::new(MemoryLog::new()))
}

fn row(k: i32, v: i32) -> Tuple {
    TupleBuilder::new(schema()).value(k).value(v).build().unwrap()
}

fn scan_all(pool: &BufferPool, txn: TransactionId) -> Vec<Tuple> {
    let file = pool.catalog().database_file(TABLE).unwrap();
    let mut scan = HeapScan::new(file, pool, txn);
    scan.open().unwrap();
    scan.collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn test_buffer_pool_never_exceeds_capacity() {
    let dir = TempDir::new().unwrap();
    let file = open_table(&dir.path().join("kv.dat"));
    for _ in 0..10 {
        file.append_empty_page().unwrap();
    }
    let pool = create_pool(file, 3);
    let txn = TransactionId::next();

    for round in 0..3 {
        for n in 0..10 {
            let page = pool
                .get_page(txn, PageId::new(TABLE, (n * 7 + round) % 10), Permissions::ReadOnly)
                .unwrap();
            assert_eq!(page.read().tuples().count(), 0);
            assert!(pool.resident_pages() <= pool.capacity());
        }
    }
    assert_eq!(pool.resident_pages(), 3);
}

#[test]
fn test_buffer_pool_two_page_eviction() {
    let dir = TempDir::new().unwrap();
    let file = open_table(&dir.path().join("kv.dat"));
    for _ in 0..3 {
        file.append_empty_page().unwrap();
    }
    let pool = create_pool(file.clone(), 2);
    let txn = TransactionId::next();
    let (p1, p2, p3) = (PageId::new(TABLE, 0), PageId::new(TABLE, 1), PageId::new(TABLE, 2));

    pool.get_page(txn, p1, Permissions::ReadOnly).unwrap();
    pool.get_page(txn, p2, Permissions::ReadOnly).unwrap();
    pool.get_page(txn, p3, Permissions::ReadOnly).unwrap();

    assert_eq!(pool.resident_pages(), 2);
    assert!(pool.is_cached(p3));
    assert_eq!(file.num_reads(), 3);

    // Every read-only fetch leaves the transaction holding a shared lock.
    for pid in [p1, p2, p3] {
        assert!(pool.holds_lock(txn, pid));
    }
}

#[test]
fn test_buffer_pool_dirty_pages_block_eviction() {
    let dir = TempDir::new().unwrap();
    let file = open_table(&dir.path().join("kv.dat"));
    file.append_empty_page().unwrap();
    file.append_empty_page().unwrap();
    let pool = create_pool(file, 1);
    let txn = TransactionId::next();

    pool.insert_tuple(txn, TABLE, &row(1, 1)).unwrap();
    let err = pool
        .get_page(txn, PageId::new(TABLE, 1), Permissions::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, StorageError::BufferPoolFull));
    assert_eq!(err.kind(), ErrorKind::Capacity);

    // After a flush the page is clean again and may be replaced.
    pool.flush_all_pages().unwrap();
    pool.get_page(txn, PageId::new(TABLE, 1), Permissions::ReadOnly).unwrap();
    assert!(!pool.is_cached(PageId::new(TABLE, 0)));
}

#[test]
fn test_buffer_pool_insert_spills_to_new_page() {
    let dir = TempDir::new().unwrap();
    let file = open_table(&dir.path().join("kv.dat"));
    let per_page = heapstore::storage::HeapPage::slots_per_page(&schema()) as i32;
    let pool = create_pool(file.clone(), 8);
    let txn = TransactionId::next();

    for k in 0..per_page + 10 {
        pool.insert_tuple(txn, TABLE, &row(k, -k)).unwrap();
    }

    assert_eq!(file.num_pages().unwrap(), 2);
    let rows = scan_all(&pool, txn);
    assert_eq!(rows.len() as i32, per_page + 10);
    let last = rows.last().unwrap().record_id().unwrap();
    assert_eq!(last.page_id, PageId::new(TABLE, 1));
    assert_eq!(last.slot_id.as_usize(), 9);
}

#[test]
fn test_buffer_pool_persistence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kv.dat");

    {
        let pool = create_pool(open_table(&path), 4);
        let txn = TransactionId::next();
        for k in 0..20 {
            pool.insert_tuple(txn, TABLE, &row(k, k * k)).unwrap();
        }
        pool.transaction_complete(txn, true).unwrap();
        pool.flush_all_pages().unwrap();
    }

    let pool = create_pool(open_table(&path), 4);
    let rows = scan_all(&pool, TransactionId::next());
    assert_eq!(rows.len(), 20);
    for (k, tuple) in rows.iter().enumerate() {
        assert_eq!(tuple, &row(k as i32, (k * k) as i32));
    }
}

#[test]
fn test_buffer_pool_discard_drops_uncommitted_changes() {
    let dir = TempDir::new().unwrap();
    let file = open_table(&dir.path().join("kv.dat"));
    let pool = create_pool(file, 4);
    let txn = TransactionId::next();

    pool.insert_tuple(txn, TABLE, &row(1, 1)).unwrap();
    pool.discard_page(PageId::new(TABLE, 0));

    assert!(scan_all(&pool, txn).is_empty());
}

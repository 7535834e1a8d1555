//! Multi-threaded locking tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use heapstore::buffer::BufferPool;
use heapstore::catalog::Catalog;
use heapstore::common::{
    BufferPoolConfig, ErrorKind, LockMode, PageId, Permissions, StorageError, TableId,
};
use heapstore::storage::{HeapFile, HeapScan};
use heapstore::transaction::Transaction;
use heapstore::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};
use heapstore::wal::MemoryLog;
use tempfile::TempDir;

const TABLE: TableId = TableId(3);
const PAGE0: PageId = PageId {
    table_id: TABLE,
    page_no: 0,
};

fn schema() -> Arc<Schema> {
    Schema::builder().column("n", DataType::Integer).build_arc()
}

fn row(n: i32) -> Tuple {
    TupleBuilder::new(schema()).value(n).build().unwrap()
}

fn create_pool(dir: &TempDir, config: BufferPoolConfig) -> Arc<BufferPool> {
    let file = HeapFile::with_id(dir.path().join("n.dat"), schema(), TABLE).unwrap();
    file.append_empty_page().unwrap();
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::new(file), "numbers");
    Arc::new(BufferPool::new(config, catalog, Arc::new(MemoryLog::new())))
}

fn count_rows(pool: &Arc<BufferPool>) -> usize {
    let txn = Transaction::begin(pool.clone());
    let file = pool.catalog().database_file(TABLE).unwrap();
    let mut scan = HeapScan::new(file, pool, txn.id());
    scan.open().unwrap();
    let n = scan.map(|t| t.unwrap()).count();
    txn.commit().unwrap();
    n
}

#[test]
fn test_reader_blocks_until_writer_commits() {
    let dir = TempDir::new().unwrap();
    let pool = create_pool(&dir, BufferPoolConfig::new(4));

    let writer = Transaction::begin(pool.clone());
    writer.insert_tuple(TABLE, &row(42)).unwrap();

    let (done_tx, done_rx) = bounded(1);
    let reader_pool = pool.clone();
    let handle = thread::spawn(move || {
        let reader = Transaction::begin(reader_pool);
        let page = reader.get_page(PAGE0, Permissions::ReadOnly).unwrap();
        let values: Vec<_> = page.read().tuples().map(|t| t.value(0).cloned()).collect();
        done_tx.send(values).unwrap();
        reader.commit().unwrap();
    });

    assert_eq!(
        done_rx.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    );

    writer.commit().unwrap();
    let values = done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(values, vec![Some(Value::Integer(42))]);
    handle.join().unwrap();
}

#[test]
fn test_shared_locks_are_concurrent() {
    let dir = TempDir::new().unwrap();
    let pool = create_pool(&dir, BufferPoolConfig::new(4));
    let (tx, rx) = bounded(4);

    // Each reader keeps its lock until all four have reported in.
    let (go_tx, go_rx) = bounded::<()>(0);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let tx = tx.clone();
            let go_rx = go_rx.clone();
            thread::spawn(move || {
                let txn = Transaction::begin(pool);
                txn.get_page(PAGE0, Permissions::ReadOnly).unwrap();
                tx.send(txn.id()).unwrap();
                go_rx.recv().ok();
                txn.commit().unwrap();
            })
        })
        .collect();

    for _ in 0..4 {
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
    }
    let holders = pool.lock_manager().holders(PAGE0);
    assert_eq!(holders.len(), 4);
    assert!(holders.iter().all(|(_, mode)| *mode == LockMode::Shared));

    drop(go_tx);
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(pool.lock_manager().holders(PAGE0).is_empty());
}

#[test]
fn test_upgrade_conflict_times_out() {
    let dir = TempDir::new().unwrap();
    let config = BufferPoolConfig::new(4).with_lock_timeout(Duration::from_millis(100));
    let pool = create_pool(&dir, config);

    let t1 = Transaction::begin(pool.clone());
    let t2 = Transaction::begin(pool.clone());
    t1.get_page(PAGE0, Permissions::ReadOnly).unwrap();
    t2.get_page(PAGE0, Permissions::ReadOnly).unwrap();

    let err = t2.get_page(PAGE0, Permissions::ReadWrite).unwrap_err();
    assert!(matches!(err, StorageError::TransactionAborted(id) if id == t2.id()));
    assert_eq!(err.kind(), ErrorKind::Aborted);
    t2.abort().unwrap();

    // With t2 gone, t1 is the sole holder and may upgrade.
    t1.get_page(PAGE0, Permissions::ReadWrite).unwrap();
    assert_eq!(pool.lock_manager().lock_mode(t1.id(), PAGE0), Some(LockMode::Exclusive));
    t1.commit().unwrap();
}

#[test]
fn test_concurrent_inserting_transactions() {
    let dir = TempDir::new().unwrap();
    let pool = create_pool(&dir, BufferPoolConfig::new(8));
    const THREADS: i32 = 4;
    const PER_THREAD: i32 = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = pool.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let txn = Transaction::begin(pool.clone());
                    txn.insert_tuple(TABLE, &row(t * PER_THREAD + i)).unwrap();
                    txn.commit().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(count_rows(&pool), (THREADS * PER_THREAD) as usize);
}

#[test]
fn test_aborting_writer_unblocks_waiter() {
    let dir = TempDir::new().unwrap();
    let pool = create_pool(&dir, BufferPoolConfig::new(4));

    let writer = Transaction::begin(pool.clone());
    writer.insert_tuple(TABLE, &row(1)).unwrap();

    let (done_tx, done_rx) = bounded(1);
    let waiter_pool = pool.clone();
    let handle = thread::spawn(move || {
        let txn = Transaction::begin(waiter_pool);
        txn.insert_tuple(TABLE, &row(2)).unwrap();
        txn.commit().unwrap();
        done_tx.send(()).unwrap();
    });

    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
    writer.abort().unwrap();
    done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    handle.join().unwrap();

    // Only the second transaction's row survives.
    assert_eq!(count_rows(&pool), 1);
}

use std::fs;
use std::sync::Arc;

use log::info;

use heapstore::buffer::BufferPool;
use heapstore::catalog::Catalog;
use heapstore::common::BufferPoolConfig;
use heapstore::storage::{DbFile, HeapFile, HeapScan};
use heapstore::transaction::Transaction;
use heapstore::tuple::{DataType, Schema, Tuple, TupleBuilder};
use heapstore::wal::FileLog;

fn print_table(title: &str, tuples: &[Tuple]) {
    println!("{} ({} rows):", title, tuples.len());
    for tuple in tuples {
        match tuple.record_id() {
            Some(rid) => println!("  {}  [{}]", tuple, rid),
            None => println!("  {}", tuple),
        }
    }
}

fn read_all(
    file: &Arc<dyn DbFile>,
    pool: &BufferPool,
    txn: &Transaction,
) -> heapstore::Result<Vec<Tuple>> {
    let mut scan = HeapScan::new(file.clone(), pool, txn.id());
    scan.open()?;
    scan.collect()
}

fn scan(file: &Arc<dyn DbFile>, pool: &Arc<BufferPool>) -> heapstore::Result<Vec<Tuple>> {
    let txn = Transaction::begin(pool.clone());
    let tuples = read_all(file, pool, &txn)?;
    txn.commit()?;
    Ok(tuples)
}

fn main() -> heapstore::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("heapstore - transactional heap storage demo");
    println!("===========================================\n");

    let dir = std::env::temp_dir().join(format!("heapstore-demo-{}", std::process::id()));
    fs::create_dir_all(&dir)?;

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(12))
        .column("balance", DataType::BigInt)
        .build_arc();
    let file: Arc<dyn DbFile> = Arc::new(HeapFile::open(dir.join("accounts.dat"), schema.clone())?);

    let catalog = Arc::new(Catalog::new());
    let table_id = catalog.add_table(file.clone(), "accounts");
    let log = Arc::new(FileLog::open(dir.join("heapstore.log"))?);
    let pool = Arc::new(BufferPool::new(BufferPoolConfig::new(16), catalog, log.clone()));
    info!("created table accounts as {} in {}", table_id, dir.display());

    // Committed inserts
    let txn = Transaction::begin(pool.clone());
    for (id, name, balance) in [(1, "ada", 120i64), (2, "grace", 75), (3, "linus", 300)] {
        let tuple = TupleBuilder::new(schema.clone())
            .value(id)
            .value(name)
            .value(balance)
            .build()?;
        txn.insert_tuple(table_id, &tuple)?;
    }
    txn.commit()?;
    print_table("after commit", &scan(&file, &pool)?);

    // Delete one row, then commit
    let txn = Transaction::begin(pool.clone());
    let rows = read_all(&file, &pool, &txn)?;
    let named = |t: &&Tuple| t.value_by_name("name").and_then(|v| v.as_str()) == Some("grace");
    if let Some(victim) = rows.iter().find(named) {
        txn.delete_tuple(victim)?;
    }
    txn.commit()?;
    print_table("after delete", &scan(&file, &pool)?);

    // Aborted insert leaves no trace
    pool.flush_all_pages()?;
    let txn = Transaction::begin(pool.clone());
    let tuple = TupleBuilder::new(schema.clone())
        .value(4)
        .value("mallory")
        .value(1_000_000i64)
        .build()?;
    txn.insert_tuple(table_id, &tuple)?;
    txn.abort()?;
    print_table("after abort", &scan(&file, &pool)?);

    let records = FileLog::read_records(log.path())?;
    println!("\nlog holds {} update records", records.len());
    println!("buffer pool: {}/{} pages resident", pool.resident_pages(), pool.capacity());

    fs::remove_dir_all(&dir).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}

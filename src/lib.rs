//! heapstore - the page-level storage core of a small relational engine
//!
//! Tables are heap files of fixed-size pages. Every page access goes through
//! a bounded buffer pool that enforces strict two-phase locking per page and
//! never evicts a dirty page (NO-STEAL). Committing a transaction logs the
//! before and after images of its pages and forces the log before releasing
//! its locks. The pages themselves are written to disk only when flushed.
//!
//! # Architecture
//!
//! - **Common** (`common`): identifiers, configuration and the error type
//! - **Tuples** (`tuple`): fixed-width schemas, values and tuples
//! - **Storage** (`storage`): the heap page format, heap files and scans
//! - **Buffer Pool** (`buffer`): the page cache and its lock manager
//!   - `BufferPool`: fetches pages, tracks dirty pages, commits and aborts
//!   - `LockManager`: shared/exclusive page locks with blocking waits
//!   - `LruKReplacer`: picks clean eviction victims
//! - **Catalog** (`catalog`): maps table IDs to their files
//! - **WAL** (`wal`): sink for before/after page images
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heapstore::buffer::BufferPool;
//! use heapstore::catalog::Catalog;
//! use heapstore::common::BufferPoolConfig;
//! use heapstore::storage::HeapFile;
//! use heapstore::transaction::Transaction;
//! use heapstore::tuple::{DataType, Schema, TupleBuilder};
//! use heapstore::wal::FileLog;
//!
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(16))
//!     .build_arc();
//! let file = Arc::new(HeapFile::open("users.dat", schema.clone()).unwrap());
//!
//! let catalog = Arc::new(Catalog::new());
//! let table_id = catalog.add_table(file, "users");
//! let log = Arc::new(FileLog::open("heapstore.log").unwrap());
//! let pool = Arc::new(BufferPool::new(BufferPoolConfig::default(), catalog, log));
//!
//! let txn = Transaction::begin(pool.clone());
//! let tuple = TupleBuilder::new(schema).value(1).value("ada").build().unwrap();
//! txn.insert_tuple(table_id, &tuple).unwrap();
//! txn.commit().unwrap();
//! pool.flush_all_pages().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod storage;
pub mod transaction;
pub mod tuple;
pub mod wal;

// Re-export commonly used types at the crate root
pub use buffer::{BufferPool, PageRef};
pub use common::{
    PageId, Permissions, RecordId, Result, SlotId, StorageError, TableId, TransactionId,
};
pub use transaction::Transaction;

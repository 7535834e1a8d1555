pub mod disk;
pub mod page;
mod scan;

pub use disk::{DbFile, HeapFile};
pub use page::HeapPage;
pub use scan::HeapScan;

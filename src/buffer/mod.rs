mod buffer_pool;
mod lock_manager;
mod lru_k_replacer;

pub use buffer_pool::*;
pub use lock_manager::*;
pub use lru_k_replacer::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Largest accepted page size (256 MB); keeps every slot index within `u32`
pub const MAX_PAGE_SIZE: usize = 1 << 28;

/// Default buffer pool capacity (number of resident pages)
pub const DEFAULT_PAGES: usize = 50;

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Returns the process-wide page size in bytes.
///
/// Slot counts and file offsets are always derived from this value at the
/// time they are computed, so an override takes effect for every page read
/// or created afterwards.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Acquire)
}

/// Overrides the process-wide page size. Intended for test harnesses.
pub fn set_page_size(size: usize) {
    assert!(
        size > 0 && size <= MAX_PAGE_SIZE,
        "page size must be in 1..={}",
        MAX_PAGE_SIZE
    );
    PAGE_SIZE.store(size, Ordering::Release);
}

/// Restores the default page size.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Release);
}

/// Tunables for a [`BufferPool`](crate::buffer::BufferPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Maximum number of resident pages
    pub num_pages: usize,
    /// K value of the LRU-K eviction policy
    pub lru_k: usize,
    /// Upper bound on a single lock wait; `None` blocks until granted
    pub lock_timeout: Option<Duration>,
}

impl BufferPoolConfig {
    pub fn new(num_pages: usize) -> Self {
        Self {
            num_pages,
            ..Self::default()
        }
    }

    pub fn with_lru_k(mut self, k: usize) -> Self {
        self.lru_k = k;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_pages: DEFAULT_PAGES,
            lru_k: DEFAULT_LRUK_K,
            lock_timeout: None,
        }
    }
}

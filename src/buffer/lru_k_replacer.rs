use std::collections::{HashMap, VecDeque};

use crate::common::PageId;

/// Monotonic access counter value
type Timestamp = u64;

/// Access history for a single resident page
#[derive(Debug)]
struct AccessHistory {
    /// Most recent access at the back, at most k entries
    history: VecDeque<Timestamp>,
}

impl AccessHistory {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Backward k-distance, or None (+inf) with fewer than k accesses.
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(now - self.history[self.history.len() - k])
        }
    }

    fn earliest_timestamp(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

/// LRU-K victim selection over resident pages.
///
/// The victim is the eligible page with the largest backward k-distance:
/// the time since its k-th most recent access. Pages with fewer than k
/// accesses count as +inf and go first, oldest first access breaking ties.
///
/// Eligibility is decided by the caller at eviction time, since it depends
/// on page state (dirty, being written) the replacer does not track.
#[derive(Debug)]
pub struct LruKReplacer {
    k: usize,
    current_timestamp: Timestamp,
    pages: HashMap<PageId, AccessHistory>,
}

impl LruKReplacer {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            current_timestamp: 0,
            pages: HashMap::new(),
        }
    }

    /// Records an access to `page_id` at the current timestamp.
    pub fn record_access(&mut self, page_id: PageId) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        self.pages
            .entry(page_id)
            .or_insert_with(AccessHistory::new)
            .record_access(timestamp, self.k);
    }

    /// Picks the victim among pages accepted by `is_evictable` and forgets it.
    pub fn evict<F>(&mut self, is_evictable: F) -> Option<PageId>
    where
        F: Fn(&PageId) -> bool,
    {
        let now = self.current_timestamp;
        let mut victim: Option<(PageId, Option<Timestamp>, Option<Timestamp>)> = None;

        for (page_id, info) in self.pages.iter() {
            if !is_evictable(page_id) {
                continue;
            }
            let k_dist = info.k_distance(now, self.k);
            let earliest = info.earliest_timestamp();

            let replace = match &victim {
                None => true,
                Some((_, victim_dist, victim_earliest)) => match (victim_dist, k_dist) {
                    (None, Some(_)) => false,
                    (Some(_), None) => true,
                    (None, None) => earliest < *victim_earliest,
                    (Some(v), Some(c)) => c > *v,
                },
            };
            if replace {
                victim = Some((*page_id, k_dist, earliest));
            }
        }

        let (page_id, _, _) = victim?;
        self.pages.remove(&page_id);
        Some(page_id)
    }

    /// Forgets `page_id`, e.g. when it is discarded from the pool.
    pub fn remove(&mut self, page_id: &PageId) {
        self.pages.remove(page_id);
    }

    /// Returns the number of tracked pages.
    pub fn size(&self) -> usize {
        self.pages.len()
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

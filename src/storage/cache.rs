//! Bounded in-memory cache of recently touched pages.
//!
//! Built on the same `lru` crate usage seen across the corpus: a fixed
//! capacity map that evicts the least-recently-used entry once full,
//! promoting on every successful `get`.
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::storage::tree::PageTree;

/// Number of decoded page trees kept resident before the oldest is
/// evicted. Reads that miss still fall through to [`PageFile`](crate::storage::file::PageFile).
pub const CACHE_CAPACITY: usize = 5;

#[derive(Debug)]
pub struct PageCache {
    inner: LruCache<u64, PageTree>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up `page_index`, promoting it to most-recently-used on hit.
    pub fn get(&mut self, page_index: u64) -> Option<&PageTree> {
        self.inner.get(&page_index)
    }

    pub fn insert(&mut self, page_index: u64, tree: PageTree) {
        self.inner.put(page_index, tree);
    }

    pub fn remove(&mut self, page_index: u64) {
        self.inner.pop(&page_index);
    }

    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.inner.cap().get()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY)
    }
}

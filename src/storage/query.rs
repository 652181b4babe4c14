//! Read-only traversal of a collection: newest-per-id resolution with
//! no secondary index, so every query walks pages from the active one
//! backward until every id it has seen has been resolved once.
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::error::{CollectionResult, EngineError};
use crate::storage::collection::{Collection, CollectionMemory};
use crate::storage::key::RecordKey;
use crate::storage::tree::{PageTree, RecordValue};

/// A resolved document: its id and live payload. Deleted ids never
/// appear here - a tombstone means the id is absent from query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u32,
    pub payload: serde_json::Value,
}

/// Slice applied to a [`Collection::find_paginated`] result: skip
/// `offset` matches, then keep at most `limit` of what remains.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Collection {
    /// Looks up `page_index`'s tree, reading through the cache and
    /// finally the backing file. Caches the result on a miss.
    async fn page_tree_at(
        &self,
        mem: &mut CollectionMemory,
        index: u64,
    ) -> Result<PageTree, EngineError> {
        if index == mem.current_page_index {
            return Ok(mem.current_page.clone());
        }
        if let Some(tree) = mem.cache.get(index) {
            return Ok(tree.clone());
        }
        let position = self.position_for(index);
        let tree = self
            .file
            .read_page(position, self.codec.as_ref())
            .await?
            .ok_or(EngineError::CorruptPage { position })?;
        mem.cache.insert(index, tree.clone());
        Ok(tree)
    }

    /// Walks pages from the active one backward, calling `visit` once
    /// per id with its newest entry (live or deleted) in that order.
    /// Stops as soon as `visit` returns [`ControlFlow::Break`], or once
    /// the oldest page has been visited.
    pub(crate) async fn scan_newest_first<F>(
        &self,
        mut visit: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(u32, &RecordValue) -> ControlFlow<()>,
    {
        let mut mem = self.memory.lock().await;
        let mut visited = HashSet::new();
        let newest_index = mem.current_page_index;

        for index in (0..=newest_index).rev() {
            let tree = self.page_tree_at(&mut mem, index).await?;
            for (key, value) in tree.entries_descending() {
                if !visited.insert(key.id) {
                    continue;
                }
                if let ControlFlow::Break(()) = visit(key.id, value) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Resolves the newest entry for a single id, if any page holds one.
    pub(crate) async fn resolve(&self, id: u32) -> Result<Option<RecordValue>, EngineError> {
        let mut mem = self.memory.lock().await;
        let probe = RecordKey::upper_bound(id);
        let newest_index = mem.current_page_index;

        for index in (0..=newest_index).rev() {
            let tree = self.page_tree_at(&mut mem, index).await?;
            if let Some((key, value)) = tree.floor(probe) {
                if key.id == id {
                    return Ok(Some(value.clone()));
                }
            }
        }
        Ok(None)
    }

    /// Returns the newest live document for `id`, or `None` if it was
    /// never inserted or its newest entry is a tombstone.
    pub async fn find_by_id(self: &Arc<Self>, id: u32) -> CollectionResult<Option<Record>> {
        let _permit = self.coordinator.acquire_reader().await;
        self.coordinator.await_flusher_unlocked().await;
        let value = self.resolve(id).await?;
        Ok(value.and_then(|v| v.as_live().cloned()).map(|payload| Record { id, payload }))
    }

    /// Returns the first live document matching `predicate`, scanning
    /// from the newest entries backward.
    pub async fn find_one<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<Option<Record>>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
    {
        let _permit = self.coordinator.acquire_reader().await;
        self.coordinator.await_flusher_unlocked().await;

        let mut found = None;
        self.scan_newest_first(|id, value| {
            if let Some(payload) = value.as_live() {
                if predicate(payload) {
                    found = Some(Record {
                        id,
                        payload: payload.clone(),
                    });
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })
        .await?;

        Ok(found)
    }

    /// Returns every live document matching `predicate`, newest first.
    pub async fn find<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<Vec<Record>>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
    {
        let _permit = self.coordinator.acquire_reader().await;
        self.coordinator.await_flusher_unlocked().await;

        let mut results = Vec::new();
        self.scan_newest_first(|id, value| {
            if let Some(payload) = value.as_live() {
                if predicate(payload) {
                    results.push(Record {
                        id,
                        payload: payload.clone(),
                    });
                }
            }
            ControlFlow::Continue(())
        })
        .await?;

        Ok(results)
    }

    /// Same traversal as [`Collection::find`], but returns a page of
    /// the result: `options.offset` matches are skipped, and at most
    /// `options.limit` (unbounded if absent) are kept. `None` is
    /// returned when the sliced page is empty, `Some` otherwise.
    pub async fn find_paginated<P>(
        self: &Arc<Self>,
        predicate: P,
        options: FindOptions,
    ) -> CollectionResult<Option<Vec<Record>>>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
    {
        let all = self.find(predicate).await?;
        let page: Vec<Record> = all
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(if page.is_empty() { None } else { Some(page) })
    }

    /// Counts live documents matching `predicate`.
    pub async fn count<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<usize>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
    {
        Ok(self.find(predicate).await?.len())
    }

    /// Whether any live document matches `predicate`.
    pub async fn exists<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<bool>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
    {
        Ok(self.find_one(predicate).await?.is_some())
    }

    /// Applies a fallible, async `map` to every live document matching
    /// `predicate`, bounded by the database's concurrency limiter.
    /// Returns the mapped results in the order their source documents
    /// were found, newest first.
    pub async fn find_and_map<P, M, Fut, T>(
        self: &Arc<Self>,
        predicate: P,
        map: M,
    ) -> CollectionResult<Vec<T>>
    where
        P: Fn(&serde_json::Value) -> bool + Send,
        M: Fn(Record) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = T> + Send,
        T: Send,
    {
        let matches = self.find(predicate).await?;
        let map = &map;
        let tasks = matches.into_iter().map(|record| {
            let concurrency = Arc::clone(&self.concurrency);
            async move {
                let _permit = concurrency.acquire().await.expect("semaphore is never closed");
                map(record).await
            }
        });
        Ok(futures::future::join_all(tasks).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionOptions;
    use crate::database::Database;
    use serde_json::json;
    use tempdir::TempDir;

    async fn open_test_collection(dir: &TempDir, name: &str) -> Arc<Collection> {
        let database = Database::open_in(dir.path()).await.unwrap();
        database
            .open_collection(CollectionOptions::new(name))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_missing_document() {
        let dir = TempDir::new("neisandb-query").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        assert!(collection.find_by_id(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_id_returns_freshly_inserted_document() {
        let dir = TempDir::new("neisandb-query").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let record = collection.insert(json!({"name": "bolt"})).await.unwrap();
        let found = collection.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(found.payload, json!({"name": "bolt"}));
    }

    #[tokio::test]
    async fn find_one_matches_predicate_over_newest_versions() {
        let dir = TempDir::new("neisandb-query").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        collection.insert(json!({"name": "bolt"})).await.unwrap();
        collection.insert(json!({"name": "nut"})).await.unwrap();

        let found = collection
            .find_one(|v| v["name"] == "nut")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.payload["name"], "nut");
    }

    #[tokio::test]
    async fn find_paginated_slices_a_prefix_of_find() {
        let dir = TempDir::new("neisandb-query").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        for i in 0..5 {
            collection.insert(json!({"n": i})).await.unwrap();
        }

        let all = collection.find(|_| true).await.unwrap();
        let page = collection
            .find_paginated(|_| true, FindOptions::new().with_offset(1).with_limit(2))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(page, all[1..3].to_vec());
    }

    #[tokio::test]
    async fn find_paginated_returns_none_when_the_page_is_empty() {
        let dir = TempDir::new("neisandb-query").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        collection.insert(json!({"n": 0})).await.unwrap();

        let page = collection
            .find_paginated(|_| true, FindOptions::new().with_offset(10))
            .await
            .unwrap();
        assert!(page.is_none());
    }
}

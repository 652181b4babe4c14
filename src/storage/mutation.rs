//! Insert, update, and delete operations.
//!
//! Every mutation is append-only: an update writes a new `(id, lsn)`
//! entry rather than touching the record's earlier versions, and a
//! delete writes a tombstone at a new lsn. Nothing here ever edits an
//! entry already written into a page.
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CollectionError;
use crate::error::CollectionResult;
use crate::storage::collection::{Collection, CollectionMemory};
use crate::storage::key::RecordKey;
use crate::storage::query::Record;
use crate::storage::tree::RecordValue;

impl Collection {
    /// Rotates the active page to disk and opens a fresh one once it
    /// has reached its entry cap. A page that isn't full yet is left
    /// in memory; [`Collection::arm_flush`] is responsible for
    /// eventually persisting it.
    pub(crate) async fn after_write(&self, mem: &mut CollectionMemory) -> Result<(), crate::error::EngineError> {
        if mem.current_page.is_full() {
            let index = mem.current_page_index;
            let tree = mem.current_page.clone();
            self.persist_page(index, &tree).await?;
            mem.last_flushed_lsn = mem.max_lsn;
            mem.cache.insert(index, tree);
            mem.current_page_index = index + 1;
            mem.current_page = crate::storage::tree::PageTree::new();
        }
        Ok(())
    }

    /// Rejects a payload if any field in `uniques` already has the
    /// same value on a different live document.
    async fn check_uniques(&self, payload: &Value, exclude_id: Option<u32>) -> CollectionResult<()> {
        for field in &self.uniques {
            let candidate = &payload[field];
            if candidate.is_null() {
                continue;
            }

            let mut conflict = false;
            self.scan_newest_first(|id, value| {
                if Some(id) == exclude_id {
                    return ControlFlow::Continue(());
                }
                if let Some(existing) = value.as_live() {
                    if &existing[field.as_str()] == candidate {
                        conflict = true;
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            })
            .await?;

            if conflict {
                return Err(CollectionError::Uniqueness(field.clone()));
            }
        }
        Ok(())
    }

    /// Inserts a new document, allocating the next id and lsn.
    pub async fn insert(self: &Arc<Self>, payload: Value) -> CollectionResult<Record> {
        let _writer = self.coordinator.acquire_writer().await;

        let normalized = self
            .schema
            .validate(&payload)
            .await
            .map_err(CollectionError::Validation)?;
        self.check_uniques(&normalized, None).await?;

        let mut mem = self.memory.lock().await;
        let id = self.next_id(mem.max_id);
        let lsn = self.next_lsn(mem.max_lsn);
        mem.current_page
            .set(RecordKey::new(id, lsn), RecordValue::Live(normalized.clone()));
        mem.max_id = Some(id);
        mem.max_lsn = Some(lsn);
        self.after_write(&mut mem).await?;
        drop(mem);

        self.arm_flush();
        Ok(Record {
            id,
            payload: normalized,
        })
    }

    async fn update_record_by_id<U>(self: &Arc<Self>, id: u32, updater: &U) -> CollectionResult<Record>
    where
        U: Fn(&Value) -> Result<Value, String> + Send + Sync,
    {
        let _writer = self.coordinator.acquire_writer().await;
        let current = self.find_by_id(id).await?.ok_or(CollectionError::NoMatch)?;
        let updated = updater(&current.payload).map_err(CollectionError::Updater)?;
        let normalized = self
            .schema
            .validate(&updated)
            .await
            .map_err(CollectionError::Validation)?;
        self.check_uniques(&normalized, Some(id)).await?;

        let mut mem = self.memory.lock().await;
        let lsn = self.next_lsn(mem.max_lsn);
        mem.current_page
            .set(RecordKey::new(id, lsn), RecordValue::Live(normalized.clone()));
        mem.max_lsn = Some(lsn);
        self.after_write(&mut mem).await?;
        drop(mem);

        self.arm_flush();
        Ok(Record {
            id,
            payload: normalized,
        })
    }

    async fn delete_record_by_id(self: &Arc<Self>, id: u32) -> CollectionResult<Record> {
        let _writer = self.coordinator.acquire_writer().await;
        let current = self.find_by_id(id).await?.ok_or(CollectionError::NoMatch)?;

        let mut mem = self.memory.lock().await;
        let lsn = self.next_lsn(mem.max_lsn);
        mem.current_page.set(RecordKey::new(id, lsn), RecordValue::Deleted);
        mem.max_lsn = Some(lsn);
        self.after_write(&mut mem).await?;
        drop(mem);

        self.arm_flush();
        Ok(current)
    }

    /// Replaces the payload of the document with `id` with `updater`'s
    /// result. Returns [`CollectionError::NoMatch`] if `id` has no live
    /// document. This is the id-addressed counterpart of
    /// [`Collection::find_one_and_update`] - spec §4.5.2's `search` may
    /// resolve by id or by predicate, and this is the id path.
    pub async fn update_by_id<U>(self: &Arc<Self>, id: u32, updater: U) -> CollectionResult<Record>
    where
        U: Fn(&Value) -> Result<Value, String> + Send + Sync,
    {
        self.update_record_by_id(id, &updater).await
    }

    /// Tombstones the document with `id`. Returns
    /// [`CollectionError::NoMatch`] if it has no live document. The
    /// id-addressed counterpart of [`Collection::find_one_and_delete`].
    pub async fn delete_by_id(self: &Arc<Self>, id: u32) -> CollectionResult<Record> {
        self.delete_record_by_id(id).await
    }

    /// Finds the first document matching `predicate` and replaces its
    /// payload with `updater`'s result.
    pub async fn find_one_and_update<P, U>(
        self: &Arc<Self>,
        predicate: P,
        updater: U,
    ) -> CollectionResult<Record>
    where
        P: Fn(&Value) -> bool + Send,
        U: Fn(&Value) -> Result<Value, String> + Send + Sync,
    {
        let existing = self.find_one(predicate).await?.ok_or(CollectionError::NoMatch)?;
        self.update_record_by_id(existing.id, &updater).await
    }

    /// Finds the first document matching `predicate` and tombstones it.
    pub async fn find_one_and_delete<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<Record>
    where
        P: Fn(&Value) -> bool + Send,
    {
        let existing = self.find_one(predicate).await?.ok_or(CollectionError::NoMatch)?;
        self.delete_record_by_id(existing.id).await
    }

    /// Updates every document matching `predicate`, running up to the
    /// database's concurrency limit worth of updates in flight at
    /// once. If any update fails, the already in-flight updates are
    /// still allowed to complete; the first failure encountered is
    /// returned as the overall error.
    pub async fn find_and_update<P, U>(
        self: &Arc<Self>,
        predicate: P,
        updater: U,
    ) -> CollectionResult<Vec<Record>>
    where
        P: Fn(&Value) -> bool + Send,
        U: Fn(&Value) -> Result<Value, String> + Send + Sync,
    {
        let matches = self.find(predicate).await?;
        let updater = &updater;

        let tasks = matches.into_iter().map(|record| {
            let concurrency = Arc::clone(&self.concurrency);
            async move {
                let _permit = concurrency.acquire().await.expect("semaphore is never closed");
                self.update_record_by_id(record.id, updater).await
            }
        });

        let outcomes = futures::future::join_all(tasks).await;
        outcomes.into_iter().collect()
    }

    /// Deletes every document matching `predicate`, running up to the
    /// database's concurrency limit worth of deletes in flight at
    /// once. Same failure semantics as [`Collection::find_and_update`].
    pub async fn find_and_delete<P>(self: &Arc<Self>, predicate: P) -> CollectionResult<Vec<Record>>
    where
        P: Fn(&Value) -> bool + Send,
    {
        let matches = self.find(predicate).await?;

        let tasks = matches.into_iter().map(|record| {
            let concurrency = Arc::clone(&self.concurrency);
            async move {
                let _permit = concurrency.acquire().await.expect("semaphore is never closed");
                self.delete_record_by_id(record.id).await
            }
        });

        let outcomes = futures::future::join_all(tasks).await;
        outcomes.into_iter().collect()
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
    async fn insert_assigns_increasing_ids() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let a = collection.insert(json!({"n": 1})).await.unwrap();
        let b = collection.insert(json!({"n": 2})).await.unwrap();
        assert_eq!(b.id, a.id + 1);
    }

    #[tokio::test]
    async fn update_then_find_by_old_value_returns_none() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        collection.insert(json!({"name": "bolt"})).await.unwrap();

        collection
            .find_one_and_update(
                |v| v["name"] == "bolt",
                |v| {
                    let mut updated = v.clone();
                    updated["name"] = json!("screw");
                    Ok(updated)
                },
            )
            .await
            .unwrap();

        assert!(collection.find_one(|v| v["name"] == "bolt").await.unwrap().is_none());
        assert!(collection.find_one(|v| v["name"] == "screw").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_then_find_returns_none() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let record = collection.insert(json!({"name": "bolt"})).await.unwrap();
        collection.find_one_and_delete(|v| v["name"] == "bolt").await.unwrap();
        assert!(collection.find_by_id(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_by_id_replaces_the_payload() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let record = collection.insert(json!({"name": "bolt"})).await.unwrap();

        let updated = collection
            .update_by_id(record.id, |v| {
                let mut updated = v.clone();
                updated["name"] = json!("screw");
                Ok(updated)
            })
            .await
            .unwrap();

        assert_eq!(updated.payload["name"], "screw");
        assert_eq!(
            collection.find_by_id(record.id).await.unwrap().unwrap().payload["name"],
            "screw"
        );
    }

    #[tokio::test]
    async fn update_by_id_with_no_match_errs() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let err = collection
            .update_by_id(0, |v: &Value| Ok(v.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::NoMatch));
    }

    #[tokio::test]
    async fn delete_by_id_tombstones_the_record() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let record = collection.insert(json!({"name": "bolt"})).await.unwrap();

        let deleted = collection.delete_by_id(record.id).await.unwrap();
        assert_eq!(deleted.payload["name"], "bolt");
        assert!(collection.find_by_id(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_id_with_no_match_errs() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let err = collection.delete_by_id(0).await.unwrap_err();
        assert!(matches!(err, CollectionError::NoMatch));
    }

    #[tokio::test]
    async fn unique_field_rejects_duplicate_insert() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let database = Database::open_in(dir.path()).await.unwrap();
        let collection = database
            .open_collection(
                CollectionOptions::new("people").with_uniques(["email".to_string()]),
            )
            .await
            .unwrap();

        collection
            .insert(json!({"email": "a@example.com"}))
            .await
            .unwrap();
        let err = collection
            .insert(json!({"email": "a@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::Uniqueness(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn find_one_and_delete_with_no_match_errs() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;
        let err = collection
            .find_one_and_delete(|v| v["name"] == "nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::NoMatch));
    }

    #[tokio::test]
    async fn concurrent_inserts_get_distinct_ids() {
        let dir = TempDir::new("neisandb-mutation").unwrap();
        let collection = open_test_collection(&dir, "widgets").await;

        let mut handles = Vec::new();
        for i in 0..100 {
            let collection = Arc::clone(&collection);
            handles.push(tokio::spawn(async move {
                collection.insert(json!({"n": i})).await.unwrap().id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }
}

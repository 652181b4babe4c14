//! Persisting the active page, immediately or after the debounce window.
use std::sync::Arc;

use log::error;

use crate::error::EngineError;
use crate::storage::collection::Collection;
use crate::storage::coordinator::FLUSH_DEBOUNCE;
use crate::storage::tree::PageTree;

impl Collection {
    pub(crate) async fn persist_page(&self, index: u64, tree: &PageTree) -> Result<(), EngineError> {
        let position = self.position_for(index);
        self.file.write_page(position, tree, self.codec.as_ref()).await
    }

    /// Writes the active page to disk, whether or not it has reached
    /// its entry cap, and records the lsn it now covers as flushed.
    ///
    /// No-ops when `last_flushed_lsn >= max_lsn` (nothing allocated
    /// since the last flush, per spec §4.7) - notably the case right
    /// after a page rotation, where `current_page` is a fresh empty
    /// tree and a flush here would otherwise write that empty page
    /// over the next page slot, corrupting the last-page-wins recovery
    /// scan on reopen.
    pub(crate) async fn internal_flush(&self) -> Result<(), EngineError> {
        let _flusher = self.coordinator.acquire_flusher().await;
        let mut mem = self.memory.lock().await;

        let Some(lsn) = mem.max_lsn else {
            return Ok(());
        };
        if mem.last_flushed_lsn.is_some_and(|flushed| flushed >= lsn) {
            return Ok(());
        }

        let index = mem.current_page_index;
        let tree = mem.current_page.clone();
        self.persist_page(index, &tree).await?;
        mem.last_flushed_lsn = Some(lsn);
        Ok(())
    }

    /// Flushes the active page immediately, cancelling any pending
    /// debounced flush so it doesn't redundantly fire afterward.
    pub async fn flush(&self) -> Result<(), EngineError> {
        self.debounce.cancel();
        self.internal_flush().await
    }

    /// Arms the debounce timer so the active page is flushed
    /// automatically once no write has touched it for the debounce
    /// window. Re-arming (e.g. from the next write) supersedes the
    /// previous timer rather than scheduling a second flush.
    pub(crate) fn arm_flush(self: &Arc<Self>) {
        let generation = self.debounce.arm();
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FLUSH_DEBOUNCE).await;
            let Some(collection) = weak.upgrade() else {
                return;
            };
            if !collection.debounce.is_current(generation) {
                return;
            }
            if let Err(err) = collection.internal_flush().await {
                error!("debounced flush for '{}' failed: {}", collection.name, err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionOptions;
    use crate::database::Database;
    use serde_json::json;
    use tempdir::TempDir;

    #[tokio::test]
    async fn flush_persists_active_page_even_if_not_full() {
        let dir = TempDir::new("neisandb-flush").unwrap();
        let database = Database::open_in(dir.path()).await.unwrap();
        let collection = database
            .open_collection(CollectionOptions::new("widgets"))
            .await
            .unwrap();

        collection.insert(json!({"n": 1})).await.unwrap();
        collection.flush().await.unwrap();

        let reopened = Database::open_in(dir.path())
            .await
            .unwrap()
            .open_collection(CollectionOptions::new("widgets"))
            .await
            .unwrap();
        assert!(reopened.find_one(|v| v["n"] == 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn flush_after_a_rotation_does_not_persist_an_empty_trailing_page() {
        use crate::storage::tree::TREE_SIZE;

        let dir = TempDir::new("neisandb-flush").unwrap();
        let database = Database::open_in(dir.path()).await.unwrap();
        let collection = database
            .open_collection(CollectionOptions::new("widgets"))
            .await
            .unwrap();

        for i in 0..TREE_SIZE {
            collection.insert(json!({"n": i})).await.unwrap();
        }
        // The TREE_SIZE-th insert rotated the page and already flushed
        // it; this flush() must be a no-op rather than writing the
        // fresh, empty current_page as a second page.
        collection.flush().await.unwrap();

        let reopened = Database::open_in(dir.path())
            .await
            .unwrap()
            .open_collection(CollectionOptions::new("widgets"))
            .await
            .unwrap();
        assert_eq!(reopened.count(|_| true).await.unwrap(), TREE_SIZE);
        assert!(reopened.find_by_id(0).await.unwrap().is_some());
        assert!(
            reopened
                .find_by_id((TREE_SIZE - 1) as u32)
                .await
                .unwrap()
                .is_some()
        );

        // A fresh insert must get a new id/lsn, not collide with id 0.
        let next = reopened.insert(json!({"n": "next"})).await.unwrap();
        assert_eq!(next.id, TREE_SIZE as u32);
    }
}

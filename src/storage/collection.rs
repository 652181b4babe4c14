//! A single named collection: its backing file, in-memory working set,
//! and the state recovered from disk when it was opened.
//!
//! # See Also
//! - [`mutation`](crate::storage::mutation): insert/update/delete operations.
//! - [`query`](crate::storage::query): read-only traversal operations.
//! - [`flush`](crate::storage::flush): persisting the active page and debouncing it.
use std::collections::HashSet;
use std::sync::{Arc, Weak};

use log::{debug, info};
use tokio::sync::{Mutex, Semaphore};

use crate::codec::PageCodec;
use crate::config::CollectionOptions;
use crate::database::Database;
use crate::error::EngineError;
use crate::schema::SchemaValidator;
use crate::storage::cache::{CACHE_CAPACITY, PageCache};
use crate::storage::coordinator::{DebounceTimer, WriteCoordinator};
use crate::storage::file::PageFile;
use crate::storage::page::{DATA_PAGE_SIZE, page_position};
use crate::storage::tree::{PageTree, TREE_SIZE};

/// All state that changes as records are inserted, updated, or
/// deleted; guarded by a single mutex so a mutation and a concurrent
/// query never observe it half-updated.
pub(crate) struct CollectionMemory {
    pub current_page_index: u64,
    pub current_page: PageTree,
    pub cache: PageCache,
    pub max_id: Option<u32>,
    pub max_lsn: Option<u64>,
    pub last_flushed_lsn: Option<u64>,
}

/// A named, file-backed set of documents.
///
/// Always held behind an `Arc` (see [`Collection::open`]): the debounced
/// flush timer spawns a background task that needs to outlive the call
/// that armed it, via a weak reference back to the collection.
pub struct Collection {
    pub(crate) name: String,
    pub(crate) file: PageFile,
    pub(crate) codec: Arc<dyn PageCodec>,
    pub(crate) schema: Arc<dyn SchemaValidator>,
    pub(crate) uniques: HashSet<String>,
    pub(crate) start: u64,
    pub(crate) tree_size: usize,
    pub(crate) page_size: usize,
    pub(crate) coordinator: WriteCoordinator,
    pub(crate) debounce: Arc<DebounceTimer>,
    pub(crate) weak_self: Weak<Collection>,
    pub(crate) memory: Mutex<CollectionMemory>,
    /// The database-wide limiter bounding how many concurrent tasks
    /// `find_and_update`/`find_and_delete`/`find_and_map` may fan out
    /// to, shared with every other collection this database opens.
    pub(crate) concurrency: Arc<Semaphore>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens (creating if necessary) the collection's backing file and
    /// reconstructs in-memory state from its last page.
    pub async fn open(
        database: &Database,
        options: CollectionOptions,
    ) -> Result<Arc<Collection>, EngineError> {
        let path = database
            .directory()
            .join("data")
            .join(format!("{}.nsdb", options.name));
        let file = PageFile::new(path, DATA_PAGE_SIZE);
        file.ensure_exists().await?;

        let codec = database.codec();
        let tree_size = TREE_SIZE;
        let page_size = DATA_PAGE_SIZE;
        let start = options.id_start;

        let file_size = file.file_size().await?;
        let memory = if file_size == 0 {
            debug!("collection '{}' has no existing pages, starting fresh", options.name);
            CollectionMemory {
                current_page_index: 0,
                current_page: PageTree::new(),
                cache: PageCache::new(CACHE_CAPACITY),
                max_id: None,
                max_lsn: None,
                last_flushed_lsn: None,
            }
        } else {
            let last_index = file_size / page_size as u64 - 1;
            let position = page_position(last_index, page_size);
            let tree = file
                .read_page(position, codec.as_ref())
                .await?
                .ok_or(EngineError::CorruptPage { position })?;

            let max_id = tree.entries_all().map(|(k, _)| k.id).max();
            let max_lsn = tree.entries_all().map(|(k, _)| k.lsn).max();

            let (current_page_index, current_page) = if tree.is_full() {
                (last_index + 1, PageTree::new())
            } else {
                (last_index, tree)
            };

            info!(
                "collection '{}' recovered at page {} (max_id={:?}, max_lsn={:?})",
                options.name, current_page_index, max_id, max_lsn
            );

            CollectionMemory {
                current_page_index,
                current_page,
                cache: PageCache::new(CACHE_CAPACITY),
                max_id,
                max_lsn,
                last_flushed_lsn: max_lsn,
            }
        };

        Ok(Arc::new_cyclic(|weak_self| Collection {
            name: options.name,
            file,
            codec,
            schema: options.schema,
            uniques: options.uniques,
            start,
            tree_size,
            page_size,
            coordinator: WriteCoordinator::new(),
            debounce: Arc::new(DebounceTimer::new()),
            weak_self: weak_self.clone(),
            memory: Mutex::new(memory),
            concurrency: database.concurrency_limiter(),
        }))
    }

    pub(crate) fn next_id(&self, max_id: Option<u32>) -> u32 {
        match max_id {
            Some(id) => id + 1,
            None => self.start as u32,
        }
    }

    pub(crate) fn next_lsn(&self, max_lsn: Option<u64>) -> u64 {
        match max_lsn {
            Some(lsn) => lsn + 1,
            None => self.start,
        }
    }

    pub(crate) fn position_for(&self, page_index: u64) -> u64 {
        page_position(page_index, self.page_size)
    }
}

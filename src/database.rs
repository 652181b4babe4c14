//! The top-level handle a caller opens to reach collections.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use tokio::sync::Semaphore;

use crate::codec::PageCodec;
use crate::config::{CollectionOptions, DatabaseOptions};
use crate::error::EngineError;
use crate::storage::collection::Collection;

/// A directory on disk holding one or more [`Collection`]s, plus the
/// codec and cross-collection concurrency limiter they share.
pub struct Database {
    directory: PathBuf,
    codec: Arc<dyn PageCodec>,
    concurrency: Arc<Semaphore>,
}

impl Database {
    /// Opens a database at `options.directory`, creating it if absent.
    pub async fn open(options: DatabaseOptions) -> Result<Self, EngineError> {
        tokio::fs::create_dir_all(&options.directory).await?;
        info!("opened database at {}", options.directory.display());
        Ok(Self {
            directory: options.directory,
            codec: options.codec,
            concurrency: Arc::new(Semaphore::new(options.clamped_concurrency())),
        })
    }

    /// Opens a database at `directory` with default options.
    pub async fn open_in(directory: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::open(DatabaseOptions {
            directory: directory.as_ref().to_path_buf(),
            ..DatabaseOptions::default()
        })
        .await
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn codec(&self) -> Arc<dyn PageCodec> {
        Arc::clone(&self.codec)
    }

    /// The semaphore bounding how many concurrent tasks `find_and_update`/
    /// `find_and_map` may run across every collection this database opens.
    pub fn concurrency_limiter(&self) -> Arc<Semaphore> {
        Arc::clone(&self.concurrency)
    }

    /// Opens (or creates) a named collection.
    pub async fn open_collection(
        &self,
        options: CollectionOptions,
    ) -> Result<Arc<Collection>, EngineError> {
        Collection::open(self, options).await
    }
}

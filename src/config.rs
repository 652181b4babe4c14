//! Construction-time configuration for databases and collections.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::codec::{BincodeCodec, PageCodec};
use crate::schema::{PermissiveValidator, SchemaValidator};

/// Lower/upper bound on [`DatabaseOptions::concurrency`].
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Options applied when constructing a [`Database`](crate::database::Database).
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Root directory collections are stored under; collection files
    /// live at `<directory>/data/<collection>.nsdb`.
    pub directory: PathBuf,
    /// Database-wide cap on parallel tasks spawned across all
    /// collections by `find_and_update`/`find_and_map`, clamped to
    /// `[MIN_CONCURRENCY, MAX_CONCURRENCY]`.
    pub concurrency: usize,
    /// Codec used to encode/decode every page this database writes.
    pub codec: Arc<dyn PageCodec>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            directory: std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("neisandb"),
            concurrency: DEFAULT_CONCURRENCY,
            codec: Arc::new(BincodeCodec),
        }
    }
}

impl DatabaseOptions {
    pub fn clamped_concurrency(&self) -> usize {
        self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
    }
}

/// Options applied when opening a [`Collection`](crate::storage::collection::Collection).
#[derive(Clone)]
pub struct CollectionOptions {
    pub name: String,
    pub schema: Arc<dyn SchemaValidator>,
    pub uniques: HashSet<String>,
    /// Base LSN a freshly created collection's numbering starts from (0
    /// or 1); also the page-index origin used by `page_position`.
    pub id_start: u64,
}

impl CollectionOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(PermissiveValidator),
            uniques: HashSet::new(),
            id_start: 0,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_uniques(mut self, uniques: impl IntoIterator<Item = String>) -> Self {
        self.uniques = uniques.into_iter().collect();
        self
    }

    pub fn with_id_start(mut self, id_start: u64) -> Self {
        self.id_start = id_start;
        self
    }
}

impl std::fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("name", &self.name)
            .field("uniques", &self.uniques)
            .field("id_start", &self.id_start)
            .finish_non_exhaustive()
    }
}

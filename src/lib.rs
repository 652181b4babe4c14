//! An embedded, file-backed, single-process document store built on
//! log-structured pages.
//!
//! Open a [`Database`], open one or more named [`Collection`]s inside
//! it, and insert/find/update/delete JSON-like documents through them.
//! There is no query language and no network surface; every operation
//! is a direct async method call.
pub mod codec;
pub mod config;
pub mod database;
pub mod error;
pub mod schema;
pub mod storage;

pub use codec::{BincodeCodec, PageCodec};
pub use config::{CollectionOptions, DatabaseOptions};
pub use database::Database;
pub use error::{CollectionError, CollectionResult, EngineError, EngineResult, FieldErrors};
pub use schema::{PermissiveValidator, SchemaValidator};
pub use storage::{Collection, FindOptions, Record};

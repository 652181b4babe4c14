//! Binary codec contract for [`PageTree`].
//!
//! `encode`/`decode` must round-trip a [`PageTree`] exactly, including
//! telling a `Deleted` tombstone apart from any live payload. The engine
//! only depends on this trait, never on a concrete serialization format,
//! so the on-disk representation can change without touching the storage
//! layer above it.
use bincode::config;

use crate::error::EngineError;
use crate::storage::tree::PageTree;

pub trait PageCodec: std::fmt::Debug + Send + Sync {
    fn encode(&self, tree: &PageTree) -> Result<Vec<u8>, EngineError>;
    fn decode(&self, bytes: &[u8]) -> Result<PageTree, EngineError>;
}

/// Default codec: `bincode` over `PageTree`'s `serde` representation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl PageCodec for BincodeCodec {
    fn encode(&self, tree: &PageTree) -> Result<Vec<u8>, EngineError> {
        bincode::serde::encode_to_vec(tree, config::standard())
            .map_err(|e| EngineError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<PageTree, EngineError> {
        bincode::serde::decode_from_slice(bytes, config::standard())
            .map(|(tree, _)| tree)
            .map_err(|e| EngineError::Codec(e.to_string()))
    }
}

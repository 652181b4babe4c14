//! Fixed-size, whole-page binary representation of a [`PageTree`].
//!
//! # Layout
//!
//! A page is written to disk as a fixed-size buffer:
//! - `LENGTH` (4 bytes, little-endian `u32`): length of the encoded tree
//! - `PADDING` (4 bytes, reserved)
//! - the encoded [`PageTree`] bytes
//! - zero padding out to the page's fixed size
//!
//! Writing and reading always happen a whole page at a time so a
//! partially written page can be detected (the recorded length won't
//! match what trails it) rather than silently truncating a tree.
//!
//! # See Also
//! - [`PageTree`]: the in-memory structure a page serializes.
//! - [`PageFile`](crate::storage::file::PageFile): issues the reads/writes a page's bytes pass through.

use crate::codec::PageCodec;
use crate::error::{EngineError, PageError};
use crate::storage::tree::PageTree;

/// Size of a data page. Chosen so an encoded [`TREE_SIZE`](crate::storage::tree::TREE_SIZE)-entry
/// tree of ordinarily sized documents fits comfortably inside it.
pub const DATA_PAGE_SIZE: usize = 256 * 1024;

/// Size reserved for a prospective offset index page. Not currently
/// produced by anything in this crate; kept as a named constant so a
/// future index type can share the same page machinery.
pub const INDEX_PAGE_SIZE: usize = 128 * 1024;

pub const LENGTH_SIZE: usize = size_of::<u32>();
pub const PADDING_SIZE: usize = 4;
pub const PAGE_HEADER_SIZE: usize = LENGTH_SIZE + PADDING_SIZE;

pub const LENGTH: usize = 0;
pub const BODY: usize = PAGE_HEADER_SIZE;

/// A single page: the length-prefixed byte form of a [`PageTree`].
#[derive(Debug, Clone)]
pub struct Page {
    pub tree: PageTree,
    pub page_size: usize,
}

impl Page {
    pub fn new(tree: PageTree, page_size: usize) -> Self {
        Self { tree, page_size }
    }

    pub fn empty(page_size: usize) -> Self {
        Self::new(PageTree::new(), page_size)
    }

    /// Encode this page into a full-size buffer, ready for a single
    /// whole-page write.
    pub fn to_bytes(&self, codec: &dyn PageCodec) -> Result<Vec<u8>, EngineError> {
        let body = codec.encode(&self.tree)?;
        if PAGE_HEADER_SIZE + body.len() > self.page_size {
            return Err(EngineError::Page(PageError::Overflow {
                encoded: body.len(),
                capacity: self.page_size - PAGE_HEADER_SIZE,
            }));
        }

        let mut buf = vec![0u8; self.page_size];
        buf[LENGTH..LENGTH + LENGTH_SIZE].copy_from_slice(&(body.len() as u32).to_le_bytes());
        buf[BODY..BODY + body.len()].copy_from_slice(&body);
        Ok(buf)
    }

    /// Decode a page previously written by [`Page::to_bytes`]. `position`
    /// is only used to report a useful error if the buffer is corrupt.
    pub fn from_bytes(
        buf: &[u8],
        page_size: usize,
        position: u64,
        codec: &dyn PageCodec,
    ) -> Result<Self, EngineError> {
        if buf.len() != page_size {
            return Err(EngineError::CorruptPage { position });
        }

        let length = u32::from_le_bytes(
            buf[LENGTH..LENGTH + LENGTH_SIZE]
                .try_into()
                .expect("slice is LENGTH_SIZE bytes"),
        ) as usize;

        if BODY + length > buf.len() {
            return Err(EngineError::CorruptPage { position });
        }

        let tree = codec.decode(&buf[BODY..BODY + length])?;
        Ok(Self::new(tree, page_size))
    }
}

/// Which page index the entry for `lsn` belongs in, given the
/// collection's `start` origin and its tree capacity.
pub fn page_index(lsn: u64, start: u64, tree_size: usize) -> u64 {
    (lsn - start) / tree_size as u64
}

/// Byte offset of `page_index`'s page within the collection's file.
pub fn page_position(page_index: u64, page_size: usize) -> u64 {
    page_index * page_size as u64
}

//! Async, handle-per-call access to a collection's backing file.
//!
//! Every read and write opens and closes its own file handle rather
//! than holding one across an `.await` point. A collection's methods
//! can suspend for an arbitrary amount of time waiting on the write
//! coordinator's locks, and a handle held open across that suspension
//! would pin a file descriptor for the lifetime of someone else's wait.
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::codec::PageCodec;
use crate::error::EngineError;
use crate::storage::page::Page;
use crate::storage::tree::PageTree;

#[derive(Debug, Clone)]
pub struct PageFile {
    path: PathBuf,
    page_size: usize,
}

impl PageFile {
    pub fn new(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file (and its parent directory) if it doesn't
    /// already exist. A no-op otherwise.
    pub async fn ensure_exists(&self) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(())
    }

    pub async fn file_size(&self) -> Result<u64, EngineError> {
        match fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads and decodes the page at `position`, or `None` if the file
    /// doesn't extend that far (position is at or past EOF).
    pub async fn read_page(
        &self,
        position: u64,
        codec: &dyn PageCodec,
    ) -> Result<Option<PageTree>, EngineError> {
        let size = self.file_size().await?;
        if position + self.page_size as u64 > size {
            return Ok(None);
        }

        let mut file = OpenOptions::new().read(true).open(&self.path).await?;
        file.seek(SeekFrom::Start(position)).await?;

        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf).await?;

        let page = Page::from_bytes(&buf, self.page_size, position, codec)?;
        Ok(Some(page.tree))
    }

    /// Writes `tree` as a whole page at `position`, extending the file
    /// with zero pages if `position` is past the current end.
    pub async fn write_page(
        &self,
        position: u64,
        tree: &PageTree,
        codec: &dyn PageCodec,
    ) -> Result<(), EngineError> {
        let page = Page::new(tree.clone(), self.page_size);
        let bytes = page.to_bytes(codec)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.seek(SeekFrom::Start(position)).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeCodec;
    use crate::storage::key::RecordKey;
    use crate::storage::tree::RecordValue;
    use serde_json::json;
    use tempdir::TempDir;

    #[tokio::test]
    async fn read_past_eof_returns_none() {
        let dir = TempDir::new("neisandb-file").unwrap();
        let file = PageFile::new(dir.path().join("c.nsdb"), 4096);
        file.ensure_exists().await.unwrap();
        let codec = BincodeCodec;
        assert!(file.read_page(0, &codec).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new("neisandb-file").unwrap();
        let file = PageFile::new(dir.path().join("c.nsdb"), 4096);
        file.ensure_exists().await.unwrap();
        let codec = BincodeCodec;

        let mut tree = PageTree::new();
        tree.set(RecordKey::new(0, 0), RecordValue::Live(json!({"a": 1})));
        file.write_page(0, &tree, &codec).await.unwrap();

        let read = file.read_page(0, &codec).await.unwrap().unwrap();
        assert_eq!(read.size(), 1);
    }

    #[tokio::test]
    async fn writing_second_page_extends_file_size() {
        let dir = TempDir::new("neisandb-file").unwrap();
        let file = PageFile::new(dir.path().join("c.nsdb"), 4096);
        file.ensure_exists().await.unwrap();
        let codec = BincodeCodec;

        file.write_page(0, &PageTree::new(), &codec).await.unwrap();
        file.write_page(4096, &PageTree::new(), &codec)
            .await
            .unwrap();
        assert_eq!(file.file_size().await.unwrap(), 8192);
    }
}

//! Local staging of uploaded files
//!
//! The `file` part of a multipart request is written to disk as it streams
//! in, then read back whole when it is forwarded to storage.
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::upload::staging::StagedFile;
//! use bytes::Bytes;
//!
//! # async fn example() -> std::io::Result<()> {
//! let staged = StagedFile::from_bytes("uploads".as_ref(), Bytes::from("Hello, World!")).await?;
//!
//! println!("File: {:?}", staged.path());
//! println!("Size: {} bytes", staged.size());
//! let body = staged.read_all().await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Staged upload on local disk
///
/// Removed from disk when dropped (RAII pattern).
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    file: Option<File>,
    size: u64,
}

impl StagedFile {
    /// Create an empty staged file inside `dir`, creating the directory if needed
    pub async fn create_in(dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("courier-{}.part", uuid::Uuid::new_v4()));
        let file = File::create(&path).await?;

        tracing::debug!(path = %path.display(), "Created staged file");

        Ok(Self {
            path,
            file: Some(file),
            size: 0,
        })
    }

    /// Stage `data` in one go
    pub async fn from_bytes(dir: &Path, data: Bytes) -> io::Result<Self> {
        let mut staged = Self::create_in(dir).await?;
        staged.write_chunk(&data).await?;
        staged.finish().await?;
        Ok(staged)
    }

    /// Append a chunk
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file is already finished"))?;
        file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flush pending writes and close the write handle
    pub async fn finish(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        Ok(())
    }

    /// Read the whole staged content into memory
    pub async fn read_all(&self) -> io::Result<Bytes> {
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Close the handle before unlinking
        self.file.take();

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up staged file"
                );
            }
        }
    }
}

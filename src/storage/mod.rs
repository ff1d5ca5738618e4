//! Storage backend module
//!
//! Abstracts the single object-store operation the service needs: writing
//! one object under a key and learning where it landed.
//!
//! # Backends
//!
//! - [`s3::S3Storage`] - AWS S3 or any S3-compatible endpoint
//! - [`memory::MemoryStorage`] - in-process map, for tests and local runs
//!
//! # Example
//!
//! ```
//! use bucket_courier::storage::{memory::MemoryStorage, PutObjectRequest, StorageBackend};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = MemoryStorage::new();
//! let output = storage
//!     .put_object(PutObjectRequest::new("my-bucket", "hello.txt", Bytes::from("hi")))
//!     .await?;
//! assert_eq!(output.location, "memory://my-bucket/hello.txt");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

pub mod memory;
pub mod s3;

/// Characters left unescaped when an object key is placed in a URL path.
/// Matches S3's own key encoding: unreserved characters and `/`.
pub(crate) const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Service error: {message}")]
    ServiceError {
        status: Option<u16>,
        message: String,
    },
}

/// A single object write
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl PutObjectRequest {
    /// Create a request without a content type
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: Bytes) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_type: None,
        }
    }

    /// Set the content type sent with the object
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectOutput {
    /// URL of the stored object as reported to callers
    pub location: String,
    pub etag: Option<String>,
}

/// Object store seam
///
/// Implementations are shared across concurrent requests and must not
/// require per-request mutation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `request.body` under `request.key`, replacing any existing object.
    async fn put_object(&self, request: PutObjectRequest)
        -> Result<PutObjectOutput, StorageError>;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;
}

//! Upload handler
//!
//! Forwards one staged upload to the storage backend and maps the outcome to
//! an HTTP response. There are exactly two outcomes:
//!
//! - `200 OK` with `File uploaded successfully. <location>`
//! - `500 Internal Server Error` with `Error uploading file`
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::storage::memory::MemoryStorage;
//! use bucket_courier::upload::{StagedFile, UploadHandler, UploadRequest};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn example() -> std::io::Result<()> {
//! let handler = UploadHandler::new(Arc::new(MemoryStorage::new()), "my-bucket");
//! let staged = StagedFile::from_bytes("uploads".as_ref(), Bytes::from("Hello")).await?;
//!
//! let response = handler
//!     .handle(UploadRequest {
//!         original_file_name: "hello.txt".into(),
//!         content_type: None,
//!         staged,
//!     })
//!     .await;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

use super::{UploadError, UploadRequest};
use crate::metrics;
use crate::server::text_response;
use crate::storage::{PutObjectOutput, PutObjectRequest, StorageBackend};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;

/// Prefix of the success body; the object location follows it
pub const SUCCESS_PREFIX: &str = "File uploaded successfully. ";

/// Body of every failure response
pub const FAILURE_MESSAGE: &str = "Error uploading file";

/// Forwards uploads to a single configured bucket
#[derive(Clone)]
pub struct UploadHandler {
    storage: Arc<dyn StorageBackend>,
    bucket: String,
}

impl UploadHandler {
    /// Create a handler writing into `bucket`
    pub fn new(storage: Arc<dyn StorageBackend>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
        }
    }

    /// Destination bucket
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store the upload and build the response
    ///
    /// The key is `original_file_name`, unmodified: an existing object under
    /// the same key is overwritten. The staged file is removed when `upload`
    /// is dropped at the end of this call.
    #[tracing::instrument(
        name = "upload.handle",
        skip(self, upload),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %upload.original_file_name,
            upload.bytes = upload.staged.size(),
            storage.backend = self.storage.name()
        )
    )]
    pub async fn handle(&self, upload: UploadRequest) -> Response<Full<Bytes>> {
        let start_time = Instant::now();
        let result = self.store(&upload).await;
        let duration = start_time.elapsed();

        metrics::record_upload_duration(
            &self.bucket,
            self.storage.name(),
            duration.as_secs_f64(),
        );

        match result {
            Ok(output) => {
                metrics::record_upload_success(&self.bucket, upload.staged.size());

                tracing::info!(
                    location = %output.location,
                    etag = ?output.etag,
                    duration_ms = duration.as_millis(),
                    "Upload stored"
                );

                text_response(
                    StatusCode::OK,
                    format!("{}{}", SUCCESS_PREFIX, output.location),
                )
            }
            Err(e) => {
                metrics::record_upload_failure(&self.bucket);
                metrics::record_error(e.kind());

                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "Upload failed"
                );

                text_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
            }
        }
    }

    async fn store(&self, upload: &UploadRequest) -> Result<PutObjectOutput, UploadError> {
        let body = upload.staged.read_all().await?;

        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: upload.original_file_name.clone(),
            body,
            content_type: upload.content_type.clone(),
        };

        Ok(self.storage.put_object(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::upload::StagedFile;
    use http_body_util::BodyExt;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn upload(dir: &std::path::Path, name: &str, data: &'static str) -> UploadRequest {
        UploadRequest {
            original_file_name: name.to_string(),
            content_type: Some("text/plain".into()),
            staged: StagedFile::from_bytes(dir, Bytes::from(data)).await.unwrap(),
        }
    }

    #[tokio::test]
    async fn test_success_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let handler = UploadHandler::new(storage.clone(), "test-bucket");

        let response = handler.handle(upload(dir.path(), "a.txt", "alpha").await).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "File uploaded successfully. memory://test-bucket/a.txt"
        );
        assert_eq!(storage.get("test-bucket", "a.txt"), Some(Bytes::from("alpha")));
        assert_eq!(
            storage
                .get_object("test-bucket", "a.txt")
                .unwrap()
                .content_type
                .as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn test_staged_file_removed_after_handling() {
        let dir = tempfile::tempdir().unwrap();
        let handler = UploadHandler::new(Arc::new(MemoryStorage::new()), "test-bucket");

        let request = upload(dir.path(), "a.txt", "alpha").await;
        let staged_path = request.staged.path().to_path_buf();
        assert!(staged_path.exists());

        handler.handle(request).await;
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_unreadable_staged_file_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let handler = UploadHandler::new(storage.clone(), "test-bucket");

        let request = upload(dir.path(), "gone.txt", "data").await;
        std::fs::remove_file(request.staged.path()).unwrap();

        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Error uploading file");
        assert!(storage.is_empty());
    }
}

//! Upload module
//!
//! Turns one multipart request into one object write.
//!
//! - [`form`] parses the multipart body and stages the `file` part on disk
//! - [`staging`] owns the staged file and removes it when dropped
//! - [`handler`] forwards the staged bytes to the storage backend

use crate::storage::StorageError;
use hyper::StatusCode;
use thiserror::Error;

pub mod form;
pub mod handler;
pub mod staging;

pub use form::extract_upload;
pub use handler::UploadHandler;
pub use staging::StagedFile;

/// Name of the multipart field carrying the file
pub const FILE_FIELD: &str = "file";

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Expected a multipart/form-data request")]
    InvalidContentType,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Only one file may be uploaded per request")]
    MultipleFiles,

    #[error("File exceeds the maximum size of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::InvalidContentType
            | UploadError::MissingFile
            | UploadError::MultipleFiles
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::IoError(_) | UploadError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Body sent to the client; server-side failures never leak details
    pub fn client_message(&self) -> String {
        match self {
            UploadError::IoError(_) | UploadError::Storage(_) => {
                handler::FAILURE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::InvalidContentType => "invalid_content_type",
            UploadError::MissingFile => "missing_file",
            UploadError::MultipleFiles => "multiple_files",
            UploadError::FileTooLarge { .. } => "file_too_large",
            UploadError::Multipart(_) => "malformed_multipart",
            UploadError::IoError(_) => "io",
            UploadError::Storage(_) => "storage",
        }
    }
}

/// One parsed upload, alive for the duration of a single request
#[derive(Debug)]
pub struct UploadRequest {
    /// Caller-supplied file name, used verbatim as the object key
    pub original_file_name: String,
    /// Content type declared on the multipart part
    pub content_type: Option<String>,
    /// File body, fully written to local disk
    pub staged: StagedFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        assert_eq!(
            UploadError::MissingFile.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::InvalidContentType.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::FileTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = UploadError::Storage(StorageError::RequestError("dns failure".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Error uploading file");

        let err = UploadError::IoError(std::io::Error::other("disk full"));
        assert_eq!(err.client_message(), "Error uploading file");
    }

    #[test]
    fn test_client_message_for_missing_file() {
        assert_eq!(UploadError::MissingFile.client_message(), "No file uploaded");
    }
}

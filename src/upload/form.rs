//! Multipart form extraction
//!
//! Streams a `multipart/form-data` body with `multer` and stages the single
//! `file` part on disk. Other fields are skipped.

use super::{StagedFile, UploadError, UploadRequest, FILE_FIELD};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use std::path::Path;

/// Limits applied while extracting an upload
#[derive(Debug, Clone)]
pub struct ExtractOptions<'a> {
    /// Directory where the file part is staged
    pub staging_dir: &'a Path,
    /// Maximum accepted file size in bytes
    pub max_file_size: Option<u64>,
}

/// Extract the `file` part of a multipart request
///
/// The returned [`UploadRequest`] holds the fully staged content. Only a
/// `file` part carrying a `filename` parameter counts as the upload; a plain
/// text field named `file` is skipped. The file name is taken verbatim and is
/// not sanitized.
#[tracing::instrument(
    name = "upload.extract",
    skip(req, options),
    fields(upload.bytes = tracing::field::Empty),
    err
)]
pub async fn extract_upload<B>(
    req: Request<B>,
    options: &ExtractOptions<'_>,
) -> Result<UploadRequest, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or(UploadError::InvalidContentType)?;

    let body_stream = req.into_body().into_data_stream();
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut upload: Option<UploadRequest> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            tracing::debug!(field = ?field.name(), "Skipping non-file field");
            continue;
        }

        // A part without a filename is a plain text field, not a file
        let Some(original_file_name) = field.file_name().map(str::to_string) else {
            tracing::debug!("Skipping `file` part without a filename");
            continue;
        };

        if upload.is_some() {
            return Err(UploadError::MultipleFiles);
        }

        let content_type = field.content_type().map(|m| m.to_string());

        let mut staged = StagedFile::create_in(options.staging_dir).await?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?
        {
            if let Some(limit) = options.max_file_size {
                if staged.size() + chunk.len() as u64 > limit {
                    return Err(UploadError::FileTooLarge { limit });
                }
            }
            staged.write_chunk(&chunk).await?;
        }
        staged.finish().await?;

        tracing::Span::current().record("upload.bytes", staged.size());
        tracing::debug!(
            file_name = %original_file_name,
            bytes = staged.size(),
            "Staged uploaded file"
        );

        upload = Some(UploadRequest {
            original_file_name,
            content_type,
            staged,
        });
    }

    upload.ok_or(UploadError::MissingFile)
}

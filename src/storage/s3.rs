//! S3 storage backend
//!
//! Writes objects with a single `PutObject` call through `aws-sdk-s3`.
//!
//! The client is built once at startup and shared by every request. SDK
//! retries are disabled: a failed write is reported to the caller as-is.
//!
//! # Example
//!
//! ```no_run
//! use bucket_courier::config::StorageConfig;
//! use bucket_courier::storage::{s3::S3Storage, PutObjectRequest, StorageBackend};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig {
//!     bucket: "my-bucket".to_string(),
//!     region: "us-east-1".to_string(),
//!     endpoint: None,
//!     access_key: Some("access-key".to_string()),
//!     secret_key: Some("secret-key".to_string()),
//!     force_path_style: false,
//! };
//! let storage = S3Storage::new(&config).await?;
//!
//! let output = storage
//!     .put_object(PutObjectRequest::new("my-bucket", "hello.txt", Bytes::from("Hello")))
//!     .await?;
//! println!("Stored at {}", output.location);
//! # Ok(())
//! # }
//! ```

use super::{PutObjectOutput, PutObjectRequest, StorageBackend, StorageError, KEY_ENCODE_SET};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use percent_encoding::utf8_percent_encode;
use std::time::Instant;

/// Provider name attached to credentials taken from configuration
const STATIC_PROVIDER_NAME: &str = "bucket-courier-config";

/// S3 storage backend
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    region: String,
    endpoint: Option<String>,
    force_path_style: bool,
}

impl S3Storage {
    /// Create a backend from configuration
    ///
    /// Static credentials from the configuration take precedence; otherwise
    /// the AWS default provider chain is used. Credentials are not checked
    /// here: missing or invalid ones surface as errors on the first write.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                STATIC_PROVIDER_NAME,
            ));
        }

        let sdk_config = loader.load().await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// Create a backend from an already loaded SDK configuration
    pub fn from_sdk_config(
        sdk_config: &SdkConfig,
        config: &StorageConfig,
    ) -> Result<Self, StorageError> {
        if config.region.trim().is_empty() {
            return Err(StorageError::ConfigError("region must not be empty".into()));
        }

        let endpoint = config
            .endpoint
            .as_ref()
            .map(|e| e.trim_end_matches('/').to_string());
        // S3-compatible endpoints are addressed path-style
        let force_path_style = config.force_path_style || endpoint.is_some();

        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config)
            .region(Region::new(config.region.clone()))
            .force_path_style(force_path_style)
            .retry_config(RetryConfig::disabled());

        if let Some(ref url) = endpoint {
            builder = builder.endpoint_url(url.clone());
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());

        tracing::info!(
            region = %config.region,
            endpoint = ?endpoint,
            path_style = force_path_style,
            "S3 storage backend initialized"
        );

        Ok(Self {
            client,
            region: config.region.clone(),
            endpoint,
            force_path_style,
        })
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// URL under which an object written to `bucket/key` is reachable
    ///
    /// Built from the configured region and endpoint using the same
    /// addressing rules the SDK applies: path-style for custom endpoints, for
    /// `force_path_style`, and for bucket names that are not valid DNS labels
    /// (dots, uppercase, underscores). It is not read back from the request
    /// the SDK sent, so endpoint overrides made outside [`StorageConfig`]
    /// (for example `AWS_ENDPOINT_URL_S3` in the environment) or FIPS and
    /// dual-stack variants are not reflected.
    pub fn object_location(&self, bucket: &str, key: &str) -> String {
        let key = utf8_percent_encode(key, KEY_ENCODE_SET);
        let path_style = self.force_path_style || !is_virtual_hostable(bucket);
        match (&self.endpoint, path_style) {
            (Some(endpoint), _) => format!("{}/{}/{}", endpoint, bucket, key),
            (None, true) => format!("https://s3.{}.amazonaws.com/{}/{}", self.region, bucket, key),
            (None, false) => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key),
        }
    }
}

/// Whether `bucket` can be used as a single host label over HTTPS
fn is_virtual_hostable(bucket: &str) -> bool {
    let bytes = bucket.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
}

/// Collapse an SDK failure into a [`StorageError`]
fn map_sdk_error(err: SdkError<PutObjectError>) -> StorageError {
    let message = DisplayErrorContext(&err).to_string();
    let status = err.raw_response().map(|response| response.status().as_u16());

    match err {
        SdkError::ServiceError(_) | SdkError::ResponseError(_) => {
            StorageError::ServiceError { status, message }
        }
        _ => StorageError::RequestError(message),
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    #[tracing::instrument(
        name = "storage.put_object",
        skip(self, request),
        fields(
            s3.bucket = %request.bucket,
            s3.key = %request.key,
            http.method = "PUT",
            upload.bytes = request.body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        request: PutObjectRequest,
    ) -> Result<PutObjectOutput, StorageError> {
        let start_time = Instant::now();
        let location = self.object_location(&request.bucket, &request.key);
        let bytes = request.body.len();

        let mut put = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body));

        if let Some(content_type) = request.content_type {
            put = put.content_type(content_type);
        }

        let output = put.send().await.map_err(map_sdk_error)?;
        let etag = output.e_tag().map(str::to_string);

        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        tracing::info!(
            location = %location,
            bytes = bytes,
            duration_ms = start_time.elapsed().as_millis(),
            "PutObject completed"
        );

        Ok(PutObjectOutput { location, etag })
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

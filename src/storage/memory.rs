//! In-memory storage backend

use super::{PutObjectOutput, PutObjectRequest, StorageBackend, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

/// Object held by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Object store kept in a concurrent map keyed by `(bucket, key)`.
///
/// Writes to an existing key replace the previous object, like S3.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: DashMap<(String, String), StoredObject>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body of the object at `bucket/key`
    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.get_object(bucket, key).map(|object| object.body)
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Keys stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put_object(
        &self,
        request: PutObjectRequest,
    ) -> Result<PutObjectOutput, StorageError> {
        let location = format!("memory://{}/{}", request.bucket, request.key);

        tracing::debug!(
            bucket = %request.bucket,
            key = %request.key,
            bytes = request.body.len(),
            "Storing object in memory"
        );

        self.objects.insert(
            (request.bucket, request.key),
            StoredObject {
                body: request.body,
                content_type: request.content_type,
            },
        );

        Ok(PutObjectOutput {
            location,
            etag: None,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

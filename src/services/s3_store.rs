//! S3 `ObjectStore` backend (requires the `s3` feature).

use crate::services::object_store::{
    META_ORIGINAL_FILENAME, META_USER_ID, ObjectStore, ObjectStoreError, ObjectStoreResult,
    PDF_CONTENT_TYPE, derive_storage_key,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, error::DisplayErrorContext, presigning::PresigningConfig, primitives::ByteStream};
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client for `bucket` in `region` using the default credential chain.
    pub async fn new(bucket: &str, region: &str) -> Self {
        tracing::info!(bucket, region, "Initializing S3 object store");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn store(
        &self,
        content: Bytes,
        original_filename: &str,
        owner_id: Uuid,
    ) -> ObjectStoreResult<String> {
        let key = derive_storage_key(original_filename, owner_id)?;
        let size = content.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content))
            .content_length(size as i64)
            .content_type(PDF_CONTENT_TYPE)
            .metadata(META_ORIGINAL_FILENAME, original_filename)
            .metadata(META_USER_ID, owner_id.to_string())
            .send()
            .await
            .map_err(|err| {
                ObjectStoreError::write(&key, DisplayErrorContext(err).to_string())
            })?;

        debug!(storage_key = %key, bytes = size, bucket = %self.bucket, "stored object");
        Ok(key)
    }

    async fn delete(&self, storage_key: &str) -> ObjectStoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|err| {
                ObjectStoreError::delete(storage_key, DisplayErrorContext(err).to_string())
            })?;
        Ok(())
    }

    async fn presign(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|err| ObjectStoreError::url(storage_key, err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .presigned(presigning)
            .await
            .map_err(|err| {
                ObjectStoreError::url(storage_key, DisplayErrorContext(err).to_string())
            })?;
        Ok(request.uri().to_string())
    }

    async fn check(&self) -> ObjectStoreResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| ObjectStoreError::Unavailable(DisplayErrorContext(err).to_string()))
    }
}

//! Object-storage implementation of [`BucketStore`].
//!
//! Built on the `object_store` crate so the same code runs against S3,
//! MinIO, or the in-memory backend used by tests. Credentials are ambient
//! (standard `AWS_*` environment variables), mirroring how the original
//! deployment relied on ambient cloud credentials.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::{debug, info};

use crate::contract::BucketStore;
use crate::error::StoreError;

/// A named bucket the run uploads its PDF snapshot into.
#[derive(Debug, Clone)]
pub struct ObjectBucketStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectBucketStore {
    /// Connect to an S3-compatible bucket using ambient `AWS_*` credentials.
    pub fn from_env(bucket: &str) -> Result<Self, StoreError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
            bucket: bucket.to_owned(),
        })
    }

    /// Wrap an existing backend. Used by tests with
    /// `object_store::memory::InMemory`.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BucketStore for ObjectBucketStore {
    async fn clear(&self) -> Result<(), StoreError> {
        let objects: Vec<_> = self.store.list(None).try_collect().await?;
        let count = objects.len();
        for meta in objects {
            self.store.delete(&meta.location).await?;
            debug!(bucket = %self.bucket, object = %meta.location, "Deleted object");
        }
        info!(bucket = %self.bucket, deleted = count, "Bucket cleared");
        Ok(())
    }

    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StoreError> {
        let size = bytes.len();
        let opts = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                content_type.to_owned(),
            )]),
            ..Default::default()
        };
        // A single put commits the whole buffered payload atomically.
        self.store
            .put_opts(&Path::from(key), PutPayload::from(bytes), opts)
            .await?;
        info!(bucket = %self.bucket, key, size, "Uploaded object");
        Ok(())
    }
}

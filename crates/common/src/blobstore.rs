//! Blob payload storage (decomposed local layout / S3 / memory).
//!
//! Only the operations maintenance needs are exposed: presence checks,
//!  deletion, and writes for fixtures.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::layout::{pathify, Layout, NODE_SHARD_DEPTH, SHARD_WIDTH};

#[derive(Debug, thiserror::Error)]
pub enum BlobstoreError {
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("S3 bucket '{0}' does not exist")]
    BucketNotFound(String),
}

/// Blob referenced by a node or revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub space_id: String,
    pub blob_id: String,
    pub size: u64,
}

impl BlobRef {
    pub fn new(space_id: impl Into<String>, blob_id: impl Into<String>, size: u64) -> Self {
        Self {
            space_id: space_id.into(),
            blob_id: blob_id.into(),
            size,
        }
    }
}

/// Outcome of a blob deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDeletion {
    Deleted,
    /// Nothing stored under the blob's key
    Missing,
}

/// Deletes blob payloads
#[async_trait]
pub trait BlobstoreDeleter: Send + Sync + std::fmt::Debug {
    async fn delete(&self, blob: &BlobRef) -> Result<BlobDeletion, BlobstoreError>;
}

/// Where purged revisions' payloads are deleted from
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobstoreConfig {
    /// Blobs are managed elsewhere; leave them untouched
    #[default]
    None,

    /// Blobs stored under the storage root, next to the nodes
    Decomposed {
        /// The storage root
        root: PathBuf,
    },

    /// Blobs in an S3 bucket, keyed by space id
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        /// `us-east-1` if unset
        region: Option<String>,
    },

    /// Process-local store, empty on creation
    Memory,
}

/// How blob ids map to object keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyStyle {
    /// `spaces/<space shards>/blobs/<blob shards>`
    Decomposed,
    /// `<space>/<blob shards>`
    Bucket,
}

/// Wrapper around the object storage backends.
#[derive(Debug, Clone)]
pub struct Blobstore {
    inner: Arc<dyn ObjectStore>,
    keys: KeyStyle,
}

impl Blobstore {
    /// Create a blobstore from configuration; `None` for
    ///  [`BlobstoreConfig::None`].
    pub async fn new(config: &BlobstoreConfig) -> Result<Option<Self>, BlobstoreError> {
        let store = match config {
            BlobstoreConfig::None => return Ok(None),

            BlobstoreConfig::Memory => Self::memory(),

            BlobstoreConfig::Decomposed { root } => {
                let is_dir = tokio::fs::metadata(root)
                    .await
                    .map(|meta| meta.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    return Err(BlobstoreError::InvalidConfig(format!(
                        "storage root {} is not a directory",
                        root.display()
                    )));
                }
                Self {
                    inner: Arc::new(
                        LocalFileSystem::new_with_prefix(root)
                            .map_err(|e| BlobstoreError::InvalidConfig(e.to_string()))?,
                    ),
                    keys: KeyStyle::Decomposed,
                }
            }

            BlobstoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobstoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast on a missing bucket instead of on the first delete
                {
                    use futures::TryStreamExt;
                    let mut stream = store.list(None);
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(BlobstoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            if e.to_string().contains("NoSuchBucket") {
                                return Err(BlobstoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                Self {
                    inner: store,
                    keys: KeyStyle::Bucket,
                }
            }
        };

        Ok(Some(store))
    }

    /// An in-memory blobstore using the decomposed key layout
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            keys: KeyStyle::Decomposed,
        }
    }

    fn key(&self, space_id: &str, blob_id: &str) -> ObjectPath {
        match self.keys {
            KeyStyle::Decomposed => ObjectPath::from(Layout::blob_key(space_id, blob_id)),
            KeyStyle::Bucket => ObjectPath::from(format!(
                "{}/{}",
                space_id,
                pathify(blob_id, NODE_SHARD_DEPTH, SHARD_WIDTH)
            )),
        }
    }

    pub async fn put(&self, blob: &BlobRef, data: Bytes) -> Result<(), BlobstoreError> {
        let key = self.key(&blob.space_id, &blob.blob_id);
        self.inner.put(&key, data.into()).await?;
        Ok(())
    }

    pub async fn exists(&self, blob: &BlobRef) -> Result<bool, BlobstoreError> {
        let key = self.key(&blob.space_id, &blob.blob_id);
        match self.inner.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobstoreDeleter for Blobstore {
    async fn delete(&self, blob: &BlobRef) -> Result<BlobDeletion, BlobstoreError> {
        // Some backends acknowledge deletes of absent keys, so look first
        if !self.exists(blob).await? {
            return Ok(BlobDeletion::Missing);
        }
        let key = self.key(&blob.space_id, &blob.blob_id);
        match self.inner.delete(&key).await {
            Ok(()) => Ok(BlobDeletion::Deleted),
            Err(object_store::Error::NotFound { .. }) => Ok(BlobDeletion::Missing),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_delete() {
        let store = Blobstore::memory();
        let blob = BlobRef::new("space-1", "0123456789", 5);
        store.put(&blob, Bytes::from("hello")).await.unwrap();
        assert!(store.exists(&blob).await.unwrap());

        assert_eq!(store.delete(&blob).await.unwrap(), BlobDeletion::Deleted);
        assert!(!store.exists(&blob).await.unwrap());
        assert_eq!(store.delete(&blob).await.unwrap(), BlobDeletion::Missing);
    }

    #[tokio::test]
    async fn test_decomposed_layout_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let config = BlobstoreConfig::Decomposed {
            root: temp.path().to_path_buf(),
        };
        let store = Blobstore::new(&config).await.unwrap().unwrap();

        let blob = BlobRef::new("ssss1111", "0123456789", 4);
        store.put(&blob, Bytes::from("data")).await.unwrap();
        let on_disk = temp
            .path()
            .join("spaces/ss/ss1111/blobs/01/23/45/67/89");
        assert!(on_disk.exists());

        assert_eq!(store.delete(&blob).await.unwrap(), BlobDeletion::Deleted);
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_decomposed_missing_root_is_not_created() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("typo");
        let config = BlobstoreConfig::Decomposed { root: root.clone() };

        assert!(matches!(
            Blobstore::new(&config).await,
            Err(BlobstoreError::InvalidConfig(_))
        ));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_none_config() {
        assert!(Blobstore::new(&BlobstoreConfig::None).await.unwrap().is_none());
    }

    #[test]
    fn test_bucket_keys() {
        let store = Blobstore {
            inner: Arc::new(InMemory::new()),
            keys: KeyStyle::Bucket,
        };
        assert_eq!(
            store.key("space-1", "0123456789").as_ref(),
            "space-1/01/23/45/67/89"
        );
    }
}

//! Object storage abstraction over S3, local filesystem and memory backends.

use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{Listing, ObjectInfo, StorageClient};
use crate::error::{Result, StorageError};

/// Configuration for the backing object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectStoreConfig {
    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        /// Region, defaults to `us-east-1`
        #[serde(default)]
        region: Option<String>,
        /// Buckets exposed through this account. S3 ListBuckets is not part
        /// of the object_store API, so the visible set is configured.
        buckets: Vec<String>,
    },
    /// Local filesystem. Every sub-directory of `path` is a bucket.
    Local { path: PathBuf },
    /// In-memory storage with a fixed set of buckets.
    Memory {
        #[serde(default)]
        buckets: Vec<String>,
    },
}

/// Storage backed by the `object_store` crate, one store per bucket.
#[derive(Debug, Clone)]
pub struct Storage {
    config: ObjectStoreConfig,
    stores: Arc<RwLock<HashMap<String, Arc<dyn ObjectStore>>>>,
}

impl Storage {
    /// Create storage from configuration.
    ///
    /// No network I/O happens here; S3 stores are built on first use.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let mut stores: HashMap<String, Arc<dyn ObjectStore>> = HashMap::new();

        match &config {
            ObjectStoreConfig::Memory { buckets } => {
                for bucket in buckets {
                    validate_bucket_name(bucket)?;
                    stores.insert(bucket.clone(), Arc::new(InMemory::new()));
                }
                info!(buckets = buckets.len(), "using in-memory object storage");
            }
            ObjectStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                info!(path = %path.display(), "using local filesystem object storage");
            }
            ObjectStoreConfig::S3 {
                endpoint, buckets, ..
            } => {
                for bucket in buckets {
                    validate_bucket_name(bucket)?;
                }
                info!(endpoint = %endpoint, buckets = buckets.len(), "using S3 object storage");
            }
        }

        Ok(Self {
            config,
            stores: Arc::new(RwLock::new(stores)),
        })
    }

    /// Shorthand for an in-memory store holding the given buckets.
    pub async fn in_memory<I, S>(buckets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ObjectStoreConfig::Memory {
            buckets: buckets.into_iter().map(Into::into).collect(),
        })
        .await
    }

    pub fn config(&self) -> &ObjectStoreConfig {
        &self.config
    }

    /// Create a bucket. Only supported for memory and local backends.
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        match &self.config {
            ObjectStoreConfig::Memory { .. } => {
                self.stores
                    .write()
                    .entry(bucket.to_string())
                    .or_insert_with(|| Arc::new(InMemory::new()));
            }
            ObjectStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path.join(bucket)).await?;
            }
            ObjectStoreConfig::S3 { .. } => {
                return Err(StorageError::InvalidConfig(
                    "bucket creation is not supported for S3 storage".to_string(),
                ));
            }
        }
        debug!(bucket = %bucket, "bucket created");
        Ok(())
    }

    /// Look up (or lazily build) the store for a bucket.
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.stores.read().get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match &self.config {
            ObjectStoreConfig::Memory { .. } => {
                return Err(StorageError::BucketNotFound(bucket.to_string()));
            }
            ObjectStoreConfig::Local { path } => {
                validate_bucket_name(bucket)?;
                let root = path.join(bucket);
                if !root.is_dir() {
                    return Err(StorageError::BucketNotFound(bucket.to_string()));
                }
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                region,
                buckets,
            } => {
                if !buckets.iter().any(|b| b == bucket) {
                    return Err(StorageError::BucketNotFound(bucket.to_string()));
                }
                let s3 = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(true)
                    .build()?;
                Arc::new(s3)
            }
        };

        let mut stores = self.stores.write();
        Ok(stores
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.store(bucket)?;
        let result = store
            .get(&object_path(key))
            .await
            .map_err(|e| not_found(e, bucket, key))?;
        Ok(result.bytes().await?)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<Bytes> {
        let store = self.store(bucket)?;
        let location = object_path(key);
        let meta = store
            .head(&location)
            .await
            .map_err(|e| not_found(e, bucket, key))?;

        let size = meta.size as u64;
        let start = range.start.min(size);
        let end = range.end.clamp(start, size);
        if start == end {
            return Ok(Bytes::new());
        }
        Ok(store
            .get_range(&location, start as usize..end as usize)
            .await
            .map_err(|e| not_found(e, bucket, key))?)
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let store = self.store(bucket)?;
        let size = data.len();
        store.put(&object_path(key), PutPayload::from(data)).await?;
        debug!(bucket = %bucket, key = %key, size = size, "object stored");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.store(bucket)?;
        match store.delete(&object_path(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!(bucket = %bucket, key = %key, "object deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let store = self.store(bucket)?;
        let meta = store
            .head(&object_path(key))
            .await
            .map_err(|e| not_found(e, bucket, key))?;
        Ok(object_info(meta))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Listing> {
        let store = self.store(bucket)?;
        let prefix = object_path(prefix);
        let prefix = if prefix.as_ref().is_empty() {
            None
        } else {
            Some(prefix)
        };

        let result = store.list_with_delimiter(prefix.as_ref()).await?;
        Ok(Listing {
            objects: result.objects.into_iter().map(object_info).collect(),
            prefixes: result
                .common_prefixes
                .into_iter()
                .map(|p| object_key(&p))
                .collect(),
        })
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let store = self.store(bucket)?;
        store
            .copy(&object_path(from), &object_path(to))
            .await
            .map_err(|e| not_found(e, bucket, from))?;
        debug!(bucket = %bucket, from = %from, to = %to, "object copied");
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut buckets = match &self.config {
            ObjectStoreConfig::Memory { .. } => self.stores.read().keys().cloned().collect(),
            ObjectStoreConfig::S3 { buckets, .. } => buckets.clone(),
            ObjectStoreConfig::Local { path } => {
                let mut buckets = Vec::new();
                let mut entries = tokio::fs::read_dir(path).await?;
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_dir() {
                        buckets.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                buckets
            }
        };
        buckets.sort();
        Ok(buckets)
    }
}

fn object_path(key: &str) -> ObjectPath {
    ObjectPath::from(key)
}

/// The key as it was written. `ObjectPath` percent-encodes reserved
/// characters and whole `.`/`..` segments, so each part is decoded.
fn object_key(path: &ObjectPath) -> String {
    path.parts()
        .map(|part| percent_decode_str(part.as_ref()).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn object_info(meta: ObjectMeta) -> ObjectInfo {
    ObjectInfo {
        key: object_key(&meta.location),
        size: meta.size as u64,
        last_modified: meta.last_modified,
    }
}

fn not_found(e: object_store::Error, bucket: &str, key: &str) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => other.into(),
    }
}

fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains('/') {
        return Err(StorageError::InvalidConfig(format!(
            "invalid bucket name: {bucket:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get_delete() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();

        storage
            .put("bucket", "home/bob/a.txt", Bytes::from("alpha"))
            .await
            .unwrap();
        let data = storage.get("bucket", "home/bob/a.txt").await.unwrap();
        assert_eq!(data.as_ref(), b"alpha");

        let info = storage.head("bucket", "home/bob/a.txt").await.unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.key, "home/bob/a.txt");

        storage.delete("bucket", "home/bob/a.txt").await.unwrap();
        let err = storage.get("bucket", "home/bob/a.txt").await.unwrap_err();
        assert!(err.is_not_found());

        // deleting again is fine
        storage.delete("bucket", "home/bob/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_range() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        storage
            .put("bucket", "f", Bytes::from("0123456789"))
            .await
            .unwrap();

        assert_eq!(storage.get_range("bucket", "f", 2..5).await.unwrap().as_ref(), b"234");
        // clamped at the end of the object
        assert_eq!(storage.get_range("bucket", "f", 8..64).await.unwrap().as_ref(), b"89");
        assert!(storage.get_range("bucket", "f", 10..20).await.unwrap().is_empty());
        assert!(storage.get_range("bucket", "f", 4..4).await.unwrap().is_empty());

        let err = storage.get_range("bucket", "missing", 0..1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_bucket() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        let err = storage.get("other", "key").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(ref b) if b == "other"));
    }

    #[tokio::test]
    async fn test_list_immediate_children() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        for key in ["home/bob/a.txt", "home/bob/docs/b.txt", "home/alice/c.txt"] {
            storage.put("bucket", key, Bytes::from("x")).await.unwrap();
        }

        let listing = storage.list("bucket", "home/bob").await.unwrap();
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "home/bob/a.txt");
        assert_eq!(listing.prefixes, vec!["home/bob/docs".to_string()]);

        // trailing separator is equivalent
        let listing = storage.list("bucket", "home/bob/").await.unwrap();
        assert_eq!(listing.objects.len(), 1);

        let root = storage.list("bucket", "").await.unwrap();
        assert!(root.objects.is_empty());
        assert_eq!(root.prefixes, vec!["home".to_string()]);

        assert!(storage.list("bucket", "nobody").await.unwrap().is_empty());
    }

    async fn assert_reserved_keys_round_trip(storage: &Storage) {
        for key in ["home/100%.txt", "home/notes #1.txt", "home/a/../b.txt", "home/./c"] {
            storage.put("bucket", key, Bytes::from(key)).await.unwrap();
        }

        let listing = storage.list("bucket", "home").await.unwrap();
        let mut keys: Vec<&str> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["home/100%.txt", "home/notes #1.txt"]);
        let mut prefixes = listing.prefixes.clone();
        prefixes.sort();
        assert_eq!(prefixes, vec!["home/.", "home/a"]);

        let nested = storage.list("bucket", "home/a").await.unwrap();
        assert_eq!(nested.prefixes, vec!["home/a/.."]);
        let nested = storage.list("bucket", "home/a/..").await.unwrap();
        assert_eq!(nested.objects[0].key, "home/a/../b.txt");

        // every listed key reads back
        for object in &listing.objects {
            let data = storage.get("bucket", &object.key).await.unwrap();
            assert_eq!(data.as_ref(), object.key.as_bytes());
        }
        let info = storage.head("bucket", "home/a/../b.txt").await.unwrap();
        assert_eq!(info.key, "home/a/../b.txt");
    }

    #[tokio::test]
    async fn test_reserved_characters_round_trip_in_memory() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        assert_reserved_keys_round_trip(&storage).await;
    }

    #[tokio::test]
    async fn test_reserved_characters_round_trip_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(ObjectStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        })
        .await
        .unwrap();
        storage.create_bucket("bucket").await.unwrap();
        assert_reserved_keys_round_trip(&storage).await;

        // the literal segment never leaves the bucket directory
        assert!(!temp_dir.path().join("bucket/home/b.txt").exists());
    }

    #[tokio::test]
    async fn test_copy() {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        storage.put("bucket", "a", Bytes::from("one")).await.unwrap();
        storage.copy("bucket", "a", "b").await.unwrap();
        assert_eq!(storage.get("bucket", "b").await.unwrap().as_ref(), b"one");

        let err = storage.copy("bucket", "missing", "c").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_memory_buckets() {
        let storage = Storage::in_memory(["b", "a"]).await.unwrap();
        storage.create_bucket("c").await.unwrap();
        assert_eq!(storage.list_buckets().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_local_buckets_are_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(ObjectStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        assert!(storage.list_buckets().await.unwrap().is_empty());
        assert!(matches!(
            storage.get("bucket", "x").await.unwrap_err(),
            StorageError::BucketNotFound(_)
        ));

        storage.create_bucket("bucket").await.unwrap();
        storage
            .put("bucket", "home/bob/file.txt", Bytes::from("local"))
            .await
            .unwrap();

        assert!(temp_dir
            .path()
            .join("bucket")
            .join("home")
            .join("bob")
            .join("file.txt")
            .exists());
        assert_eq!(storage.list_buckets().await.unwrap(), vec!["bucket"]);
        assert_eq!(
            storage.get("bucket", "home/bob/file.txt").await.unwrap().as_ref(),
            b"local"
        );

        // local delete of a missing object is not an error either
        storage.delete("bucket", "home/bob/none").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_bucket_name() {
        let err = Storage::in_memory(["a/b"]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }

    #[test]
    fn test_s3_config_region_defaults_to_none() {
        let config: ObjectStoreConfig = serde_json::from_str(
            r#"{"type":"s3","endpoint":"http://localhost:9000","access_key":"a","secret_key":"s","buckets":["data"]}"#,
        )
        .unwrap();
        assert!(matches!(config, ObjectStoreConfig::S3 { region: None, .. }));
    }
}

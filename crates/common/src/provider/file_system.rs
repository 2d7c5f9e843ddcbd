use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use storage::{StorageClient, StorageError};

use super::Properties;

pub type FileSystemHandle = Arc<S3FileSystem>;

/// A live context onto the backing store for one cache key.
///
/// Handles are shared by every session that resolves to the same key and
/// are safe to use concurrently; thread-safety of the storage client itself
/// is the client's business.
#[derive(Debug, Clone)]
pub struct S3FileSystem {
    key: String,
    endpoint: String,
    client: Arc<dyn StorageClient>,
    properties: Properties,
    visible_bucket: Option<String>,
}

impl S3FileSystem {
    pub fn new(
        key: impl Into<String>,
        endpoint: impl Into<String>,
        client: Arc<dyn StorageClient>,
        properties: Properties,
    ) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into(),
            client,
            properties,
            visible_bucket: None,
        }
    }

    /// A view of this file system in which only `bucket` is visible.
    pub fn filtered(&self, bucket: impl Into<String>) -> Self {
        Self {
            visible_bucket: Some(bucket.into()),
            ..self.clone()
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn visible_bucket(&self) -> Option<&str> {
        self.visible_bucket.as_deref()
    }

    /// Whether `bucket` can be addressed through this handle.
    pub fn is_visible(&self, bucket: &str) -> bool {
        self.visible_bucket.as_deref().map_or(true, |b| b == bucket)
    }

    /// Top-level containers visible through this handle.
    ///
    /// A filtered view reports only its own bucket, or nothing if the
    /// account cannot see that bucket.
    pub async fn file_stores(&self) -> Result<Vec<String>, StorageError> {
        let buckets = self.client.list_buckets().await?;
        Ok(buckets
            .into_iter()
            .filter(|bucket| self.is_visible(bucket))
            .collect())
    }
}

/// Live handles keyed by file system key. Shared by every chain built over
/// the same terminal provider.
#[derive(Debug, Clone, Default)]
pub struct FileSystemRegistry {
    handles: Arc<RwLock<HashMap<String, FileSystemHandle>>>,
}

impl FileSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<FileSystemHandle> {
        self.handles.read().get(key).cloned()
    }

    /// Insert unless the key is taken; returns whichever handle is stored.
    pub fn insert_if_absent(&self, handle: FileSystemHandle) -> FileSystemHandle {
        self.handles
            .write()
            .entry(handle.key().to_string())
            .or_insert(handle)
            .clone()
    }

    pub fn remove(&self, key: &str) -> Option<FileSystemHandle> {
        self.handles.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

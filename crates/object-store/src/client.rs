use std::fmt::Debug;
use std::ops::Range;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Metadata for a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full key of the object inside its bucket
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// The immediate children of a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects directly under the prefix
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes (one level deeper), without a trailing separator
    pub prefixes: Vec<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}

/// The storage operations the gateway is allowed to perform.
///
/// Keys are flat strings with `/` as a cosmetic separator. Implementations
/// must never interpret `..` segments; they are opaque key characters.
#[async_trait]
pub trait StorageClient: Send + Sync + Debug {
    /// Read the full contents of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Read a byte range of an object.
    ///
    /// The range is clamped to the object; a range starting at or past the
    /// end yields no bytes. A missing object is still `NotFound`.
    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<Bytes>;

    /// Write (or replace) an object.
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Fetch object metadata without reading the body.
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// List the immediate children of `prefix`.
    ///
    /// An empty prefix lists the bucket root. A non-empty prefix is treated
    /// as a directory whether or not it carries a trailing `/`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Listing>;

    /// Server side copy inside one bucket.
    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<()>;

    /// Every bucket visible to the configured account.
    async fn list_buckets(&self) -> Result<Vec<String>>;
}

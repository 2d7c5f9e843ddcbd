//! The file system provider decorator chain.
//!
//! Every layer implements [`SftpFileSystemProvider`] and holds exactly one
//! delegate. Default trait methods forward to the delegate, so a layer only
//! overrides the operations its policy touches. The chain is assembled per
//! session, outermost first:
//!
//! 1. [`PathEnhancingProvider`] rewrites every key through a [`PathEnhancer`]
//! 2. [`JailedProvider`] injects `JAIL`
//! 3. [`PerUserProvider`] injects `USERNAME` and keys handles by user
//! 4. [`SingleBucketProvider`] injects `BUCKET` and builds a filtered view
//! 5. [`PosixPermissionsProvider`] synthesizes `permissions` on reads
//! 6. [`DelegatableProvider`] talks to the storage client
//!
//! Only the terminal layer performs storage I/O.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use storage::StorageError;
use url::Url;

use crate::attributes::Attributes;
use crate::resolver::BackingPath;

mod delegatable;
mod file_system;
mod jailed;
mod path_enhancing;
mod per_user;
mod posix;
mod single_bucket;

pub use delegatable::{DelegatableProvider, DIRECTORY_MARKER};
pub use file_system::{FileSystemHandle, FileSystemRegistry, S3FileSystem};
pub use jailed::JailedProvider;
pub use path_enhancing::{PathEnhancer, PathEnhancingProvider};
pub use per_user::PerUserProvider;
pub use posix::PosixPermissionsProvider;
pub use single_bucket::SingleBucketProvider;

/// Environment key carrying the session's bucket.
pub const BUCKET: &str = "BUCKET";
/// Environment key carrying the session's username.
pub const USERNAME: &str = "USERNAME";
/// Environment key carrying the session's jail root.
pub const JAIL: &str = "JAIL";
/// Optional property naming the storage access key; disambiguates handles.
pub const ACCESS_KEY: &str = "ACCESS_KEY";

/// Per-session environment handed to the outermost layer.
pub type Environment = HashMap<String, String>;

/// Properties accumulated while walking down the chain.
pub type Properties = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Bucket not available")]
    BucketNotAvailable,
    #[error("Bucket not specified")]
    BucketNotSpecified,
    #[error("Username not available")]
    UsernameNotAvailable,
    #[error("Username not specified")]
    UsernameNotSpecified,
    #[error("Jail not available")]
    JailNotAvailable,
    #[error("Invalid base URI: {0}")]
    InvalidBaseUri(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("provider layer has no delegate")]
    MissingDelegate,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attributes: Attributes,
}

#[async_trait]
pub trait SftpFileSystemProvider: Send + Sync + Debug {
    /// The next layer, or `None` for the terminal provider.
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider>;

    fn next(&self) -> Result<&dyn SftpFileSystemProvider, ProviderError> {
        self.delegate().ok_or(ProviderError::MissingDelegate)
    }

    /// Copy what this layer needs from the session environment into the
    /// property map, failing if a required key is absent.
    fn overload_properties(
        &self,
        properties: &mut Properties,
        env: &Environment,
    ) -> Result<(), ProviderError> {
        self.next()?.overload_properties(properties, env)
    }

    /// Key under which the handle for these properties is cached.
    fn file_system_key(&self, uri: &Url, properties: &Properties) -> Result<String, ProviderError> {
        self.next()?.file_system_key(uri, properties)
    }

    /// Build a new handle. Never performs I/O.
    fn new_file_system(
        &self,
        uri: &Url,
        properties: &Properties,
        key: &str,
    ) -> Result<FileSystemHandle, ProviderError> {
        self.next()?.new_file_system(uri, properties, key)
    }

    fn existing_file_system(&self, key: &str) -> Option<FileSystemHandle> {
        self.delegate()?.existing_file_system(key)
    }

    /// Cache a handle. If another handle won the race for the same key, that
    /// one is returned instead.
    fn register_file_system(&self, file_system: FileSystemHandle) -> FileSystemHandle {
        match self.delegate() {
            Some(delegate) => delegate.register_file_system(file_system),
            None => file_system,
        }
    }

    fn close_file_system(&self, key: &str) -> Option<FileSystemHandle> {
        self.delegate()?.close_file_system(key)
    }

    async fn read(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<Bytes, ProviderError> {
        self.next()?.read(fs, path).await
    }

    async fn write(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        self.next()?.write(fs, path, data).await
    }

    /// Read at most `len` bytes starting at `offset`. Reading at or past the
    /// end of the file yields no bytes.
    async fn read_range(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, ProviderError> {
        self.next()?.read_range(fs, path, offset, len).await
    }

    /// Write `data` at `offset`, creating the file if needed. A gap past the
    /// current end is zero-filled.
    async fn write_at(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        self.next()?.write_at(fs, path, offset, data).await
    }

    async fn delete(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
        self.next()?.delete(fs, path).await
    }

    async fn create_directory(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.next()?.create_directory(fs, path).await
    }

    async fn list(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Vec<DirEntry>, ProviderError> {
        self.next()?.list(fs, path).await
    }

    async fn copy(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.next()?.copy(fs, from, to).await
    }

    async fn rename(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.next()?.rename(fs, from, to).await
    }

    async fn exists(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<bool, ProviderError> {
        self.next()?.exists(fs, path).await
    }

    async fn read_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Attributes, ProviderError> {
        self.next()?.read_attributes(fs, path).await
    }

    async fn set_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        attributes: &Attributes,
    ) -> Result<(), ProviderError> {
        self.next()?.set_attributes(fs, path, attributes).await
    }

    async fn create_link(
        &self,
        fs: &S3FileSystem,
        link: &BackingPath,
        target: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.next()?.create_link(fs, link, target).await
    }

    async fn create_symbolic_link(
        &self,
        fs: &S3FileSystem,
        link: &BackingPath,
        target: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.next()?.create_symbolic_link(fs, link, target).await
    }

    async fn lock(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
        self.next()?.lock(fs, path).await
    }
}

/// Handle lookup across the whole chain.
pub trait FileSystemProviderExt: SftpFileSystemProvider {
    /// Return the cached handle for `env`, building and registering one on
    /// a miss. Must be called on the outermost layer so every layer gets to
    /// contribute its properties.
    fn get_file_system(&self, uri: &Url, env: &Environment) -> Result<FileSystemHandle, ProviderError> {
        let mut properties = Properties::new();
        self.overload_properties(&mut properties, env)?;
        let key = self.file_system_key(uri, &properties)?;

        if let Some(existing) = self.existing_file_system(&key) {
            tracing::debug!(key = %key, "reusing file system");
            return Ok(existing);
        }

        let file_system = self.new_file_system(uri, &properties, &key)?;
        Ok(self.register_file_system(file_system))
    }
}

impl<T: SftpFileSystemProvider + ?Sized> FileSystemProviderExt for T {}

/// Wrap a terminal provider in the standard decorator order.
pub fn assemble_chain(
    terminal: Arc<dyn SftpFileSystemProvider>,
    enhancer: Arc<dyn PathEnhancer>,
) -> Arc<dyn SftpFileSystemProvider> {
    let posix = Arc::new(PosixPermissionsProvider::new(terminal));
    let single_bucket = Arc::new(SingleBucketProvider::new(posix));
    let per_user = Arc::new(PerUserProvider::new(single_bucket));
    let jailed = Arc::new(JailedProvider::new(per_user));
    Arc::new(PathEnhancingProvider::new(jailed, enhancer))
}

/// `host[:port]` of a base URI, rejecting hosts with unexpected characters.
pub fn endpoint_host(uri: &Url) -> Result<String, ProviderError> {
    let host = uri
        .host_str()
        .filter(|host| {
            !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        })
        .ok_or_else(|| ProviderError::InvalidBaseUri(uri.to_string()))?;

    Ok(match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

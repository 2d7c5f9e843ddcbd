use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{DirEntry, ProviderError, S3FileSystem, SftpFileSystemProvider};
use crate::attributes::Attributes;
use crate::resolver::BackingPath;

/// Rewrites backing keys before they reach the store.
pub trait PathEnhancer: Send + Sync {
    fn enhance(&self, key: &str) -> String;
}

impl<F> PathEnhancer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn enhance(&self, key: &str) -> String {
        self(key)
    }
}

/// Leaves keys untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPathEnhancer;

impl PathEnhancer for IdentityPathEnhancer {
    fn enhance(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Places every key under a fixed prefix, e.g. a mount point.
///
/// Keys already under the prefix are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPrefixPathEnhancer {
    prefix: String,
}

impl PathEnhancer for FixedPrefixPathEnhancer {
    fn enhance(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            return key.to_string();
        }
        let key = key.trim_start_matches('/');
        let under_prefix = key
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if under_prefix {
            key.to_string()
        } else if key.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

impl dyn PathEnhancer {
    pub fn identity() -> Arc<dyn PathEnhancer> {
        Arc::new(IdentityPathEnhancer)
    }

    pub fn fixed_prefix(prefix: impl Into<String>) -> Arc<dyn PathEnhancer> {
        Arc::new(FixedPrefixPathEnhancer {
            prefix: prefix.into().trim_matches('/').to_string(),
        })
    }
}

/// Passes every path argument through a [`PathEnhancer`] before forwarding.
pub struct PathEnhancingProvider {
    delegate: Arc<dyn SftpFileSystemProvider>,
    enhancer: Arc<dyn PathEnhancer>,
}

impl PathEnhancingProvider {
    pub fn new(delegate: Arc<dyn SftpFileSystemProvider>, enhancer: Arc<dyn PathEnhancer>) -> Self {
        Self { delegate, enhancer }
    }

    fn enhance(&self, path: &BackingPath) -> BackingPath {
        path.with_key(self.enhancer.enhance(path.key()))
    }
}

impl std::fmt::Debug for PathEnhancingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathEnhancingProvider")
            .field("delegate", &self.delegate)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SftpFileSystemProvider for PathEnhancingProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        Some(self.delegate.as_ref())
    }

    async fn read(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<Bytes, ProviderError> {
        self.delegate.read(fs, &self.enhance(path)).await
    }

    async fn write(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        self.delegate.write(fs, &self.enhance(path), data).await
    }

    async fn read_range(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, ProviderError> {
        self.delegate
            .read_range(fs, &self.enhance(path), offset, len)
            .await
    }

    async fn write_at(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        self.delegate
            .write_at(fs, &self.enhance(path), offset, data)
            .await
    }

    async fn delete(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
        self.delegate.delete(fs, &self.enhance(path)).await
    }

    async fn create_directory(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.delegate.create_directory(fs, &self.enhance(path)).await
    }

    async fn list(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Vec<DirEntry>, ProviderError> {
        self.delegate.list(fs, &self.enhance(path)).await
    }

    async fn copy(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.delegate
            .copy(fs, &self.enhance(from), &self.enhance(to))
            .await
    }

    async fn rename(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.delegate
            .rename(fs, &self.enhance(from), &self.enhance(to))
            .await
    }

    async fn exists(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<bool, ProviderError> {
        self.delegate.exists(fs, &self.enhance(path)).await
    }

    async fn read_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Attributes, ProviderError> {
        self.delegate.read_attributes(fs, &self.enhance(path)).await
    }

    async fn set_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        attributes: &Attributes,
    ) -> Result<(), ProviderError> {
        self.delegate
            .set_attributes(fs, &self.enhance(path), attributes)
            .await
    }

    async fn create_link(
        &self,
        fs: &S3FileSystem,
        link: &BackingPath,
        target: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.delegate
            .create_link(fs, &self.enhance(link), &self.enhance(target))
            .await
    }

    async fn create_symbolic_link(
        &self,
        fs: &S3FileSystem,
        link: &BackingPath,
        target: &BackingPath,
    ) -> Result<(), ProviderError> {
        self.delegate
            .create_symbolic_link(fs, &self.enhance(link), &self.enhance(target))
            .await
    }

    async fn lock(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
        self.delegate.lock(fs, &self.enhance(path)).await
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use super::{DirEntry, ProviderError, S3FileSystem, SftpFileSystemProvider};
use crate::attributes::{with_synthetic_permissions, Attributes};
use crate::resolver::BackingPath;

/// Adds a synthetic `permissions` entry to every attribute read.
///
/// The delegate's result is never mutated in place; each read gets its own
/// copy.
#[derive(Debug)]
pub struct PosixPermissionsProvider {
    delegate: Arc<dyn SftpFileSystemProvider>,
}

impl PosixPermissionsProvider {
    pub fn new(delegate: Arc<dyn SftpFileSystemProvider>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl SftpFileSystemProvider for PosixPermissionsProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        Some(self.delegate.as_ref())
    }

    async fn read_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Attributes, ProviderError> {
        let attrs = self.delegate.read_attributes(fs, path).await?;
        Ok(with_synthetic_permissions(&attrs))
    }

    async fn list(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Vec<DirEntry>, ProviderError> {
        let entries = self.delegate.list(fs, path).await?;
        Ok(entries
            .into_iter()
            .map(|entry| DirEntry {
                attributes: with_synthetic_permissions(&entry.attributes),
                name: entry.name,
            })
            .collect())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use storage::{StorageClient, StorageError};
use tracing::{debug, info, trace};
use url::Url;

use super::{
    endpoint_host, DirEntry, Environment, FileSystemHandle, FileSystemRegistry, Properties,
    ProviderError, S3FileSystem, SftpFileSystemProvider, ACCESS_KEY,
};
use crate::attributes::{self, Attributes};
use crate::resolver::BackingPath;

/// Zero-byte object that marks an otherwise empty directory.
pub const DIRECTORY_MARKER: &str = ".s3sftp";

/// Terminal provider: owns the storage client and the handle registry.
///
/// Directories are emulated. A directory exists if its marker object exists
/// or any key lives underneath it; the bucket root exists if the account
/// lists the bucket.
#[derive(Debug, Clone)]
pub struct DelegatableProvider {
    client: Arc<dyn StorageClient>,
    registry: FileSystemRegistry,
}

impl DelegatableProvider {
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self::with_registry(client, FileSystemRegistry::new())
    }

    pub fn with_registry(client: Arc<dyn StorageClient>, registry: FileSystemRegistry) -> Self {
        Self { client, registry }
    }

    pub fn client(&self) -> &Arc<dyn StorageClient> {
        &self.client
    }

    pub fn registry(&self) -> &FileSystemRegistry {
        &self.registry
    }

    async fn bucket_exists(&self, fs: &S3FileSystem, bucket: &str) -> Result<bool, ProviderError> {
        Ok(fs.client().list_buckets().await?.iter().any(|b| b == bucket))
    }

    async fn directory_exists(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<bool, ProviderError> {
        if path.is_bucket_root() {
            return self.bucket_exists(fs, path.bucket()).await;
        }
        match fs.client().list(path.bucket(), path.key()).await {
            Ok(listing) => Ok(!listing.is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a failed object read. A missing key that is really a directory
    /// reports `IsADirectory`.
    async fn read_error(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        e: StorageError,
    ) -> Result<ProviderError, ProviderError> {
        if e.is_not_found() && self.directory_exists(fs, path).await? {
            return Ok(ProviderError::IsADirectory(path.visible().to_string()));
        }
        Ok(storage_error(e, path))
    }

    async fn file_exists(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<bool, ProviderError> {
        if path.is_bucket_root() {
            return Ok(false);
        }
        match fs.client().head(path.bucket(), path.key()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_visible(fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
    if fs.is_visible(path.bucket()) {
        Ok(())
    } else {
        Err(ProviderError::NotFound(path.visible().to_string()))
    }
}

fn storage_error(e: StorageError, path: &BackingPath) -> ProviderError {
    if e.is_not_found() {
        ProviderError::NotFound(path.visible().to_string())
    } else {
        ProviderError::Storage(e)
    }
}

fn marker_key(path: &BackingPath) -> String {
    if path.is_bucket_root() {
        DIRECTORY_MARKER.to_string()
    } else {
        format!("{}/{}", path.key(), DIRECTORY_MARKER)
    }
}

fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[async_trait]
impl SftpFileSystemProvider for DelegatableProvider {
    fn delegate(&self) -> Option<&dyn SftpFileSystemProvider> {
        None
    }

    fn overload_properties(
        &self,
        properties: &mut Properties,
        env: &Environment,
    ) -> Result<(), ProviderError> {
        for (name, value) in env {
            properties
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(())
    }

    fn file_system_key(&self, uri: &Url, properties: &Properties) -> Result<String, ProviderError> {
        let host = endpoint_host(uri)?;
        Ok(match properties.get(ACCESS_KEY) {
            Some(access_key) => format!("{access_key}@{host}"),
            None => host,
        })
    }

    fn new_file_system(
        &self,
        uri: &Url,
        properties: &Properties,
        key: &str,
    ) -> Result<FileSystemHandle, ProviderError> {
        let endpoint = endpoint_host(uri)?;
        info!(key = %key, endpoint = %endpoint, "creating file system");
        Ok(Arc::new(S3FileSystem::new(
            key,
            endpoint,
            self.client.clone(),
            properties.clone(),
        )))
    }

    fn existing_file_system(&self, key: &str) -> Option<FileSystemHandle> {
        self.registry.get(key)
    }

    fn register_file_system(&self, file_system: FileSystemHandle) -> FileSystemHandle {
        self.registry.insert_if_absent(file_system)
    }

    fn close_file_system(&self, key: &str) -> Option<FileSystemHandle> {
        debug!(key = %key, "closing file system");
        self.registry.remove(key)
    }

    async fn read(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<Bytes, ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), "read");
        check_visible(fs, path)?;
        if path.is_bucket_root() {
            return Err(ProviderError::IsADirectory(path.visible().to_string()));
        }
        match fs.client().get(path.bucket(), path.key()).await {
            Ok(data) => Ok(data),
            Err(e) => Err(self.read_error(fs, path, e).await?),
        }
    }

    async fn read_range(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), offset, len, "read range");
        check_visible(fs, path)?;
        if path.is_bucket_root() {
            return Err(ProviderError::IsADirectory(path.visible().to_string()));
        }
        let range = offset..offset.saturating_add(len);
        match fs.client().get_range(path.bucket(), path.key(), range).await {
            Ok(data) => Ok(data),
            Err(e) => Err(self.read_error(fs, path, e).await?),
        }
    }

    /// Read, splice and put back. Not atomic against concurrent writers.
    async fn write_at(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        offset: u64,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), offset, size = data.len(), "write at");
        check_visible(fs, path)?;
        if path.is_bucket_root() {
            return Err(ProviderError::IsADirectory(path.visible().to_string()));
        }

        let existing = match fs.client().get(path.bucket(), path.key()).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => {
                if self.directory_exists(fs, path).await? {
                    return Err(ProviderError::IsADirectory(path.visible().to_string()));
                }
                Bytes::new()
            }
            Err(e) => return Err(storage_error(e, path)),
        };

        let start = usize::try_from(offset)
            .map_err(|_| ProviderError::Unsupported("offsets beyond addressable memory"))?;
        let end = start
            .checked_add(data.len())
            .ok_or(ProviderError::Unsupported("offsets beyond addressable memory"))?;

        let mut content = existing.to_vec();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(&data);

        fs.client()
            .put(path.bucket(), path.key(), Bytes::from(content))
            .await
            .map_err(|e| storage_error(e, path))
    }

    async fn write(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), size = data.len(), "write");
        check_visible(fs, path)?;
        if path.is_bucket_root() {
            return Err(ProviderError::IsADirectory(path.visible().to_string()));
        }
        fs.client()
            .put(path.bucket(), path.key(), data)
            .await
            .map_err(|e| storage_error(e, path))
    }

    async fn delete(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<(), ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), "delete");
        check_visible(fs, path)?;
        if path.is_bucket_root() {
            return Err(ProviderError::Unsupported("deleting a bucket"));
        }
        if self.file_exists(fs, path).await? {
            return fs
                .client()
                .delete(path.bucket(), path.key())
                .await
                .map_err(|e| storage_error(e, path));
        }

        let listing = fs
            .client()
            .list(path.bucket(), path.key())
            .await
            .map_err(|e| storage_error(e, path))?;
        if listing.is_empty() {
            return Err(ProviderError::NotFound(path.visible().to_string()));
        }
        let only_marker = listing.prefixes.is_empty()
            && listing
                .objects
                .iter()
                .all(|object| last_segment(&object.key) == DIRECTORY_MARKER);
        if !only_marker {
            return Err(ProviderError::DirectoryNotEmpty(path.visible().to_string()));
        }
        fs.client()
            .delete(path.bucket(), &marker_key(path))
            .await
            .map_err(|e| storage_error(e, path))
    }

    async fn create_directory(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<(), ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), "create directory");
        check_visible(fs, path)?;
        if path.is_bucket_root()
            || self.file_exists(fs, path).await?
            || self.directory_exists(fs, path).await?
        {
            return Err(ProviderError::AlreadyExists(path.visible().to_string()));
        }
        fs.client()
            .put(path.bucket(), &marker_key(path), Bytes::new())
            .await
            .map_err(|e| storage_error(e, path))
    }

    async fn list(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Vec<DirEntry>, ProviderError> {
        trace!(bucket = %path.bucket(), key = %path.key(), "list");
        check_visible(fs, path)?;
        let listing = fs
            .client()
            .list(path.bucket(), path.key())
            .await
            .map_err(|e| storage_error(e, path))?;

        if listing.is_empty() && !path.is_bucket_root() {
            return Err(if self.file_exists(fs, path).await? {
                ProviderError::NotADirectory(path.visible().to_string())
            } else {
                ProviderError::NotFound(path.visible().to_string())
            });
        }

        let mut entries: Vec<DirEntry> = listing
            .prefixes
            .iter()
            .map(|prefix| DirEntry {
                name: last_segment(prefix).to_string(),
                attributes: attributes::directory_attributes(),
            })
            .collect();
        entries.extend(
            listing
                .objects
                .iter()
                .filter(|object| last_segment(&object.key) != DIRECTORY_MARKER)
                .map(|object| DirEntry {
                    name: last_segment(&object.key).to_string(),
                    attributes: attributes::file_attributes(object.size, object.last_modified),
                }),
        );
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn copy(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        trace!(bucket = %from.bucket(), from = %from.key(), to = %to.key(), "copy");
        check_visible(fs, from)?;
        check_visible(fs, to)?;
        if from.bucket() != to.bucket() {
            return Err(ProviderError::Unsupported("copying between buckets"));
        }
        if !self.file_exists(fs, from).await? {
            return Err(if self.directory_exists(fs, from).await? {
                ProviderError::Unsupported("copying a directory")
            } else {
                ProviderError::NotFound(from.visible().to_string())
            });
        }
        fs.client()
            .copy(from.bucket(), from.key(), to.key())
            .await
            .map_err(|e| storage_error(e, from))
    }

    /// Copy then delete. Not atomic.
    async fn rename(
        &self,
        fs: &S3FileSystem,
        from: &BackingPath,
        to: &BackingPath,
    ) -> Result<(), ProviderError> {
        if !self.file_exists(fs, from).await? && self.directory_exists(fs, from).await? {
            return Err(ProviderError::Unsupported("renaming a directory"));
        }
        self.copy(fs, from, to).await?;
        fs.client()
            .delete(from.bucket(), from.key())
            .await
            .map_err(|e| storage_error(e, from))
    }

    async fn exists(&self, fs: &S3FileSystem, path: &BackingPath) -> Result<bool, ProviderError> {
        if !fs.is_visible(path.bucket()) {
            return Ok(false);
        }
        Ok(self.file_exists(fs, path).await? || self.directory_exists(fs, path).await?)
    }

    async fn read_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
    ) -> Result<Attributes, ProviderError> {
        check_visible(fs, path)?;
        if !path.is_bucket_root() {
            match fs.client().head(path.bucket(), path.key()).await {
                Ok(info) => return Ok(attributes::file_attributes(info.size, info.last_modified)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if self.directory_exists(fs, path).await? {
            Ok(attributes::directory_attributes())
        } else {
            Err(ProviderError::NotFound(path.visible().to_string()))
        }
    }

    async fn set_attributes(
        &self,
        fs: &S3FileSystem,
        path: &BackingPath,
        attributes: &Attributes,
    ) -> Result<(), ProviderError> {
        check_visible(fs, path)?;
        if attributes.is_empty() {
            return Ok(());
        }
        Err(ProviderError::Unsupported("setting file attributes"))
    }

    async fn create_link(
        &self,
        _fs: &S3FileSystem,
        _link: &BackingPath,
        _target: &BackingPath,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("hard links"))
    }

    async fn create_symbolic_link(
        &self,
        _fs: &S3FileSystem,
        _link: &BackingPath,
        _target: &BackingPath,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("symbolic links"))
    }

    async fn lock(&self, _fs: &S3FileSystem, _path: &BackingPath) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("byte-range locks"))
    }
}

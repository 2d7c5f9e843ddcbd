//! Per-session SFTP command surface.
//!
//! The transport's command dispatcher calls into [`JailedSftpSubsystem`] with
//! raw client paths. Each call resolves the path inside the session's jail,
//! then forwards to the session's provider chain. Errors are returned as-is;
//! mapping them onto SFTP status codes is the transport's job.

use std::sync::Arc;

use bytes::Bytes;
use storage::StorageError;
use tracing::debug;

use crate::attributes::{self, Attributes};
use crate::cache::UserFileSystemResolver;
use crate::config::ServerConfiguration;
use crate::provider::{DirEntry, ProviderError, SftpFileSystemProvider};
use crate::resolver::{BackingPath, PathResolver, ResolveError, ResolvedPath};
use crate::session::SftpSession;

#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Observer of attribute changes made through a subsystem.
///
/// Observers only ever see the attribute set that is actually forwarded,
/// i.e. after `permissions` has been stripped.
pub trait SftpEventListener: Send + Sync {
    fn modifying_attributes(
        &self,
        _session: &SftpSession,
        _path: &BackingPath,
        _attributes: &Attributes,
    ) {
    }

    fn modified_attributes(
        &self,
        _session: &SftpSession,
        _path: &BackingPath,
        _attributes: &Attributes,
        _error: Option<&ProviderError>,
    ) {
    }
}

pub struct JailedSftpSubsystem {
    session: SftpSession,
    resolver: PathResolver,
    provider: Arc<dyn SftpFileSystemProvider>,
    listeners: Vec<Arc<dyn SftpEventListener>>,
}

impl JailedSftpSubsystem {
    pub fn session(&self) -> &SftpSession {
        &self.session
    }

    /// Resolve a raw client path to its backing location.
    pub fn resolve_file(&self, raw: &str) -> Result<BackingPath, SubsystemError> {
        Ok(self.resolver.resolve(raw, &self.session)?.path)
    }

    fn resolve(&self, raw: &str) -> Result<ResolvedPath, SubsystemError> {
        Ok(self.resolver.resolve(raw, &self.session)?)
    }

    pub async fn read_attributes(&self, raw: &str) -> Result<Attributes, SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.read_attributes(&file_system, &path).await?)
    }

    /// Apply an attribute change. `permissions` is dropped before listeners
    /// or the backend see the request.
    pub async fn set_attributes(
        &self,
        raw: &str,
        requested: &Attributes,
    ) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        let attrs = attributes::without_permissions(requested);
        if attrs.len() != requested.len() {
            debug!(path = %path.visible(), "dropping unsupported permissions attribute");
        }

        for listener in &self.listeners {
            listener.modifying_attributes(&self.session, &path, &attrs);
        }
        let result = self
            .provider
            .set_attributes(&file_system, &path, &attrs)
            .await;
        for listener in &self.listeners {
            listener.modified_attributes(&self.session, &path, &attrs, result.as_ref().err());
        }
        Ok(result?)
    }

    pub async fn read_file(&self, raw: &str) -> Result<Bytes, SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.read(&file_system, &path).await?)
    }

    pub async fn write_file(&self, raw: &str, data: Bytes) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.write(&file_system, &path, data).await?)
    }

    /// Positioned read, as issued by SFTP `READ`.
    pub async fn read_at(
        &self,
        raw: &str,
        offset: u64,
        len: u64,
    ) -> Result<Bytes, SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self
            .provider
            .read_range(&file_system, &path, offset, len)
            .await?)
    }

    /// Positioned write, as issued by SFTP `WRITE`.
    pub async fn write_at(&self, raw: &str, offset: u64, data: Bytes) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self
            .provider
            .write_at(&file_system, &path, offset, data)
            .await?)
    }

    /// Remove a file. Directories are refused.
    pub async fn remove(&self, raw: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        let attrs = self.provider.read_attributes(&file_system, &path).await?;
        if attributes::is_directory(&attrs) {
            return Err(ProviderError::IsADirectory(path.visible().to_string()).into());
        }
        Ok(self.provider.delete(&file_system, &path).await?)
    }

    pub async fn make_directory(&self, raw: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.create_directory(&file_system, &path).await?)
    }

    /// Remove an empty directory. Files are refused.
    pub async fn remove_directory(&self, raw: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        let attrs = self.provider.read_attributes(&file_system, &path).await?;
        if !attributes::is_directory(&attrs) {
            return Err(ProviderError::NotADirectory(path.visible().to_string()).into());
        }
        Ok(self.provider.delete(&file_system, &path).await?)
    }

    pub async fn read_directory(&self, raw: &str) -> Result<Vec<DirEntry>, SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.list(&file_system, &path).await?)
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(from)?;
        let target = self.resolve(to)?.path;
        Ok(self.provider.rename(&file_system, &path, &target).await?)
    }

    pub async fn exists(&self, raw: &str) -> Result<bool, SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.exists(&file_system, &path).await?)
    }

    pub async fn create_link(&self, link: &str, target: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(link)?;
        let target = self.resolve(target)?.path;
        Ok(self.provider.create_link(&file_system, &path, &target).await?)
    }

    pub async fn create_symbolic_link(
        &self,
        link: &str,
        target: &str,
    ) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(link)?;
        let target = self.resolve(target)?.path;
        Ok(self
            .provider
            .create_symbolic_link(&file_system, &path, &target)
            .await?)
    }

    pub async fn lock(&self, raw: &str) -> Result<(), SubsystemError> {
        let ResolvedPath { file_system, path } = self.resolve(raw)?;
        Ok(self.provider.lock(&file_system, &path).await?)
    }

    /// Top-level containers visible to this session.
    pub async fn file_stores(&self) -> Result<Vec<String>, SubsystemError> {
        let ResolvedPath { file_system, .. } = self.resolve("")?;
        Ok(file_system.file_stores().await?)
    }
}

/// Creates subsystems, handing each the registered listeners.
#[derive(Clone)]
pub struct JailedSftpSubsystemFactory {
    configuration: Arc<ServerConfiguration>,
    users: Arc<dyn UserFileSystemResolver>,
    listeners: Vec<Arc<dyn SftpEventListener>>,
}

impl JailedSftpSubsystemFactory {
    pub fn new(
        configuration: Arc<ServerConfiguration>,
        users: Arc<dyn UserFileSystemResolver>,
    ) -> Self {
        Self {
            configuration,
            users,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn SftpEventListener>) {
        self.listeners.push(listener);
    }

    pub fn create(
        &self,
        session: SftpSession,
        provider: Arc<dyn SftpFileSystemProvider>,
    ) -> JailedSftpSubsystem {
        JailedSftpSubsystem {
            session,
            resolver: self.configuration.path_resolver(self.users.clone()),
            provider,
            listeners: self.listeners.clone(),
        }
    }
}

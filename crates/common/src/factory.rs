use std::sync::Arc;

use tracing::debug;

use crate::cache::UserFileSystemResolver;
use crate::config::ServerConfiguration;
use crate::provider::{
    assemble_chain, FileSystemHandle, FileSystemProviderExt, ProviderError,
    SftpFileSystemProvider,
};
use crate::session::SftpSession;

#[derive(Debug, thiserror::Error)]
pub enum FileSystemFactoryError {
    #[error("failed to create file system for {username}: {source}")]
    Provider {
        username: String,
        #[source]
        source: ProviderError,
    },
}

/// A session's provider chain and the backend handle it resolved to.
#[derive(Debug, Clone)]
pub struct SessionFileSystem {
    pub provider: Arc<dyn SftpFileSystemProvider>,
    pub handle: FileSystemHandle,
}

/// Builds (or reuses) the backend file system for a session.
#[derive(Clone)]
pub struct SessionFileSystemFactory {
    configuration: Arc<ServerConfiguration>,
    terminal: Arc<dyn SftpFileSystemProvider>,
    users: Arc<dyn UserFileSystemResolver>,
}

impl SessionFileSystemFactory {
    pub fn new(
        configuration: Arc<ServerConfiguration>,
        terminal: Arc<dyn SftpFileSystemProvider>,
        users: Arc<dyn UserFileSystemResolver>,
    ) -> Self {
        Self {
            configuration,
            terminal,
            users,
        }
    }

    /// A fresh decorator chain over the shared terminal provider.
    pub fn provider(&self) -> Arc<dyn SftpFileSystemProvider> {
        assemble_chain(
            self.terminal.clone(),
            self.configuration.path_enhancer().clone(),
        )
    }

    /// Assemble the session's chain and make sure its user has a handle.
    ///
    /// A user's first session builds the handle and associates it; later
    /// sessions reuse it. The lookup, build and association happen under
    /// the user cache's lock.
    pub fn create_file_system(
        &self,
        session: &SftpSession,
    ) -> Result<SessionFileSystem, FileSystemFactoryError> {
        let provider = self.provider();
        let env = self.configuration.session_environment(session);
        let uri = self.configuration.uri();

        let handle = self
            .users
            .resolve_or_try_insert(session.username(), &mut || {
                debug!(username = %session.username(), "building file system for user");
                provider.get_file_system(uri, &env)
            })
            .map_err(|source| FileSystemFactoryError::Provider {
                username: session.username().to_string(),
                source,
            })?;

        Ok(SessionFileSystem { provider, handle })
    }
}

#[cfg(test)]
mod tests {
    use storage::Storage;
    use url::Url;

    use super::*;
    use crate::cache::DefaultUserFileSystemResolver;
    use crate::provider::DelegatableProvider;
    use crate::session::SessionId;
    use crate::strategy;

    async fn factory() -> (SessionFileSystemFactory, Arc<DefaultUserFileSystemResolver>) {
        let storage = Storage::in_memory(["bucket"]).await.unwrap();
        let configuration = ServerConfiguration::builder()
            .uri(Url::parse("s3://localhost:9000").unwrap())
            .session_bucket(strategy::simple_session_bucket("bucket"))
            .build()
            .unwrap();
        let users = Arc::new(DefaultUserFileSystemResolver::new());
        let factory = SessionFileSystemFactory::new(
            Arc::new(configuration),
            Arc::new(DelegatableProvider::new(Arc::new(storage))),
            users.clone(),
        );
        (factory, users)
    }

    fn session(username: &str) -> SftpSession {
        SftpSession::new(SessionId::generate(), username, None)
    }

    #[tokio::test]
    async fn test_first_session_associates_handle() {
        let (factory, users) = factory().await;
        assert!(users.resolve("bob").is_none());

        let created = factory.create_file_system(&session("bob")).unwrap();
        assert_eq!(created.handle.key(), "bob@localhost:9000");
        assert_eq!(created.handle.visible_bucket(), Some("bucket"));

        let cached = users.resolve("bob").unwrap();
        assert!(Arc::ptr_eq(&cached, &created.handle));
    }

    #[tokio::test]
    async fn test_sessions_of_one_user_share_handle() {
        let (factory, users) = factory().await;
        let first = factory.create_file_system(&session("bob")).unwrap();
        let second = factory.create_file_system(&session("bob")).unwrap();
        let other = factory.create_file_system(&session("alice")).unwrap();

        assert!(Arc::ptr_eq(&first.handle, &second.handle));
        assert!(!Arc::ptr_eq(&first.handle, &other.handle));
        // each session gets its own chain
        assert!(!Arc::ptr_eq(&first.provider, &second.provider));
        assert_eq!(users.len(), 2);
    }
}

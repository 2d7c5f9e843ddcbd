use std::sync::Arc;

use storage::StorageClient;
use tracing::info;

use crate::auth::{
    DefaultHomeDirExistsChecker, HomeDirExistsChecker, PasswordAuthenticationProvider,
    PasswordAuthenticator, PublicKeyAuthenticationProvider, PublicKeyAuthenticator,
};
use crate::cache::{DefaultUserFileSystemResolver, UserFileSystemResolver};
use crate::config::ServerConfiguration;
use crate::factory::{FileSystemFactoryError, SessionFileSystemFactory};
use crate::provider::{DelegatableProvider, FileSystemRegistry};
use crate::resolver::ResolveError;
use crate::session::{SftpSession, TransportSession};
use crate::subsystem::{
    JailedSftpSubsystem, JailedSftpSubsystemFactory, SftpEventListener, SubsystemError,
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    FileSystem(#[from] FileSystemFactoryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Subsystem(#[from] SubsystemError),
}

/// The wired-up gateway: shared caches, factories and authentication.
///
/// Listening, host keys and protocol dispatch stay with the transport; it
/// calls [`SftpGateway::authenticate_password`] (or the public key variant)
/// during the handshake and [`SftpGateway::open_session`] once the SFTP
/// subsystem is requested.
pub struct SftpGateway {
    configuration: Arc<ServerConfiguration>,
    users: Arc<dyn UserFileSystemResolver>,
    registry: FileSystemRegistry,
    file_systems: SessionFileSystemFactory,
    subsystems: JailedSftpSubsystemFactory,
    password: Option<PasswordAuthenticationProvider>,
    public_key: Option<PublicKeyAuthenticationProvider>,
}

impl SftpGateway {
    pub fn builder(
        configuration: ServerConfiguration,
        client: Arc<dyn StorageClient>,
    ) -> SftpGatewayBuilder {
        SftpGatewayBuilder {
            configuration,
            client,
            users: None,
            home_checker: None,
            password: None,
            public_key: None,
            listeners: Vec::new(),
        }
    }

    pub fn configuration(&self) -> &Arc<ServerConfiguration> {
        &self.configuration
    }

    pub fn users(&self) -> &Arc<dyn UserFileSystemResolver> {
        &self.users
    }

    pub fn registry(&self) -> &FileSystemRegistry {
        &self.registry
    }

    /// Set up the file system for an authenticated session and hand back
    /// its subsystem.
    ///
    /// A home outside the jail is rejected here, before the client gets to
    /// issue any command.
    pub fn open_session(
        &self,
        transport: &dyn TransportSession,
    ) -> Result<JailedSftpSubsystem, GatewayError> {
        let session = SftpSession::of(transport);
        let file_system = self.file_systems.create_file_system(&session)?;
        let subsystem = self.subsystems.create(session, file_system.provider);

        let home = subsystem.resolve_file("")?;
        info!(
            session = %subsystem.session(),
            file_system = %file_system.handle.key(),
            home = %home,
            "session opened"
        );
        Ok(subsystem)
    }

    /// `false` when no password authenticator is configured.
    pub async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
        transport: &dyn TransportSession,
    ) -> bool {
        match &self.password {
            Some(provider) => provider.authenticate(username, password, transport).await,
            None => false,
        }
    }

    /// `false` when no public key authenticator is configured.
    pub async fn authenticate_public_key(
        &self,
        username: &str,
        key: &str,
        transport: &dyn TransportSession,
    ) -> bool {
        match &self.public_key {
            Some(provider) => provider.authenticate(username, key, transport).await,
            None => false,
        }
    }
}

pub struct SftpGatewayBuilder {
    configuration: ServerConfiguration,
    client: Arc<dyn StorageClient>,
    users: Option<Arc<dyn UserFileSystemResolver>>,
    home_checker: Option<Arc<dyn HomeDirExistsChecker>>,
    password: Option<Arc<dyn PasswordAuthenticator>>,
    public_key: Option<Arc<dyn PublicKeyAuthenticator>>,
    listeners: Vec<Arc<dyn SftpEventListener>>,
}

impl SftpGatewayBuilder {
    /// Replace the default in-process user cache.
    pub fn users(mut self, users: Arc<dyn UserFileSystemResolver>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn home_checker(mut self, checker: Arc<dyn HomeDirExistsChecker>) -> Self {
        self.home_checker = Some(checker);
        self
    }

    pub fn password_authenticator(mut self, authenticator: Arc<dyn PasswordAuthenticator>) -> Self {
        self.password = Some(authenticator);
        self
    }

    pub fn public_key_authenticator(
        mut self,
        authenticator: Arc<dyn PublicKeyAuthenticator>,
    ) -> Self {
        self.public_key = Some(authenticator);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn SftpEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> SftpGateway {
        let configuration = Arc::new(self.configuration);
        let users = self
            .users
            .unwrap_or_else(|| Arc::new(DefaultUserFileSystemResolver::new()));
        let registry = FileSystemRegistry::new();
        let terminal = Arc::new(DelegatableProvider::with_registry(
            self.client.clone(),
            registry.clone(),
        ));

        let file_systems =
            SessionFileSystemFactory::new(configuration.clone(), terminal, users.clone());
        let mut subsystems = JailedSftpSubsystemFactory::new(configuration.clone(), users.clone());
        for listener in self.listeners {
            subsystems.add_listener(listener);
        }

        let home_checker = self.home_checker.unwrap_or_else(|| {
            Arc::new(DefaultHomeDirExistsChecker::new(
                configuration.clone(),
                self.client.clone(),
            ))
        });
        let password = self
            .password
            .map(|auth| PasswordAuthenticationProvider::new(auth, home_checker.clone()));
        let public_key = self
            .public_key
            .map(|auth| PublicKeyAuthenticationProvider::new(auth, home_checker.clone()));

        SftpGateway {
            configuration,
            users,
            registry,
            file_systems,
            subsystems,
            password,
            public_key,
        }
    }
}

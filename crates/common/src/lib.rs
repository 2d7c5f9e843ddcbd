//! Core of the s3sftp gateway.
//!
//! Sits between an SSH/SFTP transport and an object store: resolves client
//! paths inside per-session jails, composes the provider decorator chain for
//! each session, caches backend handles per user and adds the thin layer of
//! POSIX emulation clients expect.

pub mod attributes;
pub mod auth;
pub mod cache;
pub mod config;
pub mod factory;
pub mod gateway;
pub mod provider;
pub mod resolver;
pub mod session;
pub mod strategy;
pub mod subsystem;

pub mod prelude {
    pub use crate::attributes::{AttributeValue, Attributes};
    pub use crate::auth::{
        AuthorizedKeysAuthenticator, DefaultHomeDirExistsChecker, HomeDirExistsChecker,
        PasswordAuthenticator, PublicKeyAuthenticator, SimpleAuthenticator,
    };
    pub use crate::cache::{DefaultUserFileSystemResolver, UserFileSystemResolver};
    pub use crate::config::{ConfigurationError, ServerConfiguration};
    pub use crate::gateway::{GatewayError, SftpGateway};
    pub use crate::provider::{
        DirEntry, FileSystemHandle, PathEnhancer, ProviderError, SftpFileSystemProvider,
    };
    pub use crate::resolver::{BackingPath, ResolveError};
    pub use crate::session::{SessionId, SftpSession, TransportSession};
    pub use crate::subsystem::{JailedSftpSubsystem, SftpEventListener, SubsystemError};
}

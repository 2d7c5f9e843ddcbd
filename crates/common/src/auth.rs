//! Authentication glue.
//!
//! Credential matching is delegated to [`PasswordAuthenticator`] and
//! [`PublicKeyAuthenticator`] implementations. On top of that, a login is
//! only accepted if the user's home directory exists in the store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use storage::StorageClient;
use tracing::{debug, warn};

use crate::config::ServerConfiguration;
use crate::provider::{
    assemble_chain, DelegatableProvider, FileSystemProviderExt, ProviderError,
};
use crate::resolver::{resolve_path, ResolveError};
use crate::session::{SftpSession, TransportSession};

/// Checks a password for a user.
pub trait PasswordAuthenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str, session: &SftpSession) -> bool;
}

/// Checks an OpenSSH-formatted public key for a user.
pub trait PublicKeyAuthenticator: Send + Sync {
    fn authenticate(&self, username: &str, key: &str, session: &SftpSession) -> bool;
}

/// Probes whether a session's home exists.
#[async_trait]
pub trait HomeDirExistsChecker: Send + Sync {
    /// Must not fail: any error means "does not exist".
    async fn check(&self, session: &SftpSession) -> bool;
}

#[derive(Debug, thiserror::Error)]
enum HomeProbeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Resolves the home through a throwaway provider chain and checks that
/// something lives there.
///
/// The chain gets its own handle registry, so probing never leaves handles
/// behind in the shared caches.
pub struct DefaultHomeDirExistsChecker {
    configuration: Arc<ServerConfiguration>,
    client: Arc<dyn StorageClient>,
}

impl DefaultHomeDirExistsChecker {
    pub fn new(configuration: Arc<ServerConfiguration>, client: Arc<dyn StorageClient>) -> Self {
        Self {
            configuration,
            client,
        }
    }

    async fn probe(&self, session: &SftpSession) -> Result<bool, HomeProbeError> {
        let terminal = Arc::new(DelegatableProvider::new(self.client.clone()));
        let provider = assemble_chain(terminal, self.configuration.path_enhancer().clone());
        let env = self.configuration.session_environment(session);
        let file_system = provider.get_file_system(self.configuration.uri(), &env)?;

        let home = resolve_path(
            "",
            &self.configuration.session_bucket().bucket(session),
            &self.configuration.session_home().home_path(session),
            &self.configuration.session_jail().jail(session),
        )?;
        Ok(provider.exists(&file_system, &home).await?)
    }
}

#[async_trait]
impl HomeDirExistsChecker for DefaultHomeDirExistsChecker {
    async fn check(&self, session: &SftpSession) -> bool {
        match self.probe(session).await {
            Ok(exists) => {
                debug!(username = %session.username(), exists, "home directory probe");
                exists
            }
            Err(e) => {
                warn!(username = %session.username(), error = %e, "home directory probe failed");
                false
            }
        }
    }
}

/// Password check followed by the home probe.
#[derive(Clone)]
pub struct PasswordAuthenticationProvider {
    authenticator: Arc<dyn PasswordAuthenticator>,
    home_checker: Arc<dyn HomeDirExistsChecker>,
}

impl PasswordAuthenticationProvider {
    pub fn new(
        authenticator: Arc<dyn PasswordAuthenticator>,
        home_checker: Arc<dyn HomeDirExistsChecker>,
    ) -> Self {
        Self {
            authenticator,
            home_checker,
        }
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        transport: &dyn TransportSession,
    ) -> bool {
        let session = SftpSession::for_user(transport, username);
        self.authenticator.authenticate(username, password, &session)
            && self.home_checker.check(&session).await
    }
}

/// Public key check followed by the home probe.
#[derive(Clone)]
pub struct PublicKeyAuthenticationProvider {
    authenticator: Arc<dyn PublicKeyAuthenticator>,
    home_checker: Arc<dyn HomeDirExistsChecker>,
}

impl PublicKeyAuthenticationProvider {
    pub fn new(
        authenticator: Arc<dyn PublicKeyAuthenticator>,
        home_checker: Arc<dyn HomeDirExistsChecker>,
    ) -> Self {
        Self {
            authenticator,
            home_checker,
        }
    }

    pub async fn authenticate(
        &self,
        username: &str,
        key: &str,
        transport: &dyn TransportSession,
    ) -> bool {
        let session = SftpSession::for_user(transport, username);
        self.authenticator.authenticate(username, key, &session)
            && self.home_checker.check(&session).await
    }
}

/// Username to password table.
#[derive(Debug, Clone, Default)]
pub struct SimpleAuthenticator {
    users: HashMap<String, String>,
}

impl SimpleAuthenticator {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }
}

impl PasswordAuthenticator for SimpleAuthenticator {
    fn authenticate(&self, username: &str, password: &str, _session: &SftpSession) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// Username to authorized OpenSSH public keys.
///
/// Keys match on algorithm and key data; the comment field is ignored.
#[derive(Debug, Clone, Default)]
pub struct AuthorizedKeysAuthenticator {
    keys: HashMap<String, Vec<String>>,
}

impl AuthorizedKeysAuthenticator {
    pub fn new(keys: HashMap<String, Vec<String>>) -> Self {
        Self { keys }
    }

    pub fn with_key(mut self, username: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.entry(username.into()).or_default().push(key.into());
        self
    }
}

fn key_fingerprint(key: &str) -> Option<(&str, &str)> {
    let mut fields = key.split_whitespace();
    Some((fields.next()?, fields.next()?))
}

impl PublicKeyAuthenticator for AuthorizedKeysAuthenticator {
    fn authenticate(&self, username: &str, key: &str, _session: &SftpSession) -> bool {
        let Some(offered) = key_fingerprint(key) else {
            return false;
        };
        self.keys.get(username).is_some_and(|authorized| {
            authorized
                .iter()
                .filter_map(|k| key_fingerprint(k))
                .any(|k| k == offered)
        })
    }
}

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::cache::UserFileSystemResolver;
use crate::provider::{Environment, PathEnhancer, BUCKET, JAIL, USERNAME};
use crate::resolver::PathResolver;
use crate::session::SftpSession;
use crate::strategy::{self, SessionBucket, SessionHome, SessionJail};

/// Subdirectory used by the default per-user home strategy.
pub const DEFAULT_HOME_SUBDIR: &str = "home";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

/// Everything the gateway needs to know to serve sessions.
#[derive(Clone)]
pub struct ServerConfiguration {
    uri: Url,
    session_bucket: Arc<dyn SessionBucket>,
    session_home: Arc<dyn SessionHome>,
    session_jail: Arc<dyn SessionJail>,
    path_enhancer: Arc<dyn PathEnhancer>,
}

impl ServerConfiguration {
    pub fn builder() -> ServerConfigurationBuilder {
        ServerConfigurationBuilder::default()
    }

    /// Base URI of the storage endpoint; its host keys backend handles.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn session_bucket(&self) -> &Arc<dyn SessionBucket> {
        &self.session_bucket
    }

    pub fn session_home(&self) -> &Arc<dyn SessionHome> {
        &self.session_home
    }

    pub fn session_jail(&self) -> &Arc<dyn SessionJail> {
        &self.session_jail
    }

    pub fn path_enhancer(&self) -> &Arc<dyn PathEnhancer> {
        &self.path_enhancer
    }

    /// The environment handed to the provider chain for `session`.
    pub fn session_environment(&self, session: &SftpSession) -> Environment {
        let mut env = Environment::new();
        env.insert(BUCKET.to_string(), self.session_bucket.bucket(session));
        env.insert(USERNAME.to_string(), session.username().to_string());
        env.insert(JAIL.to_string(), self.session_jail.jail(session));
        env
    }

    pub fn path_resolver(&self, users: Arc<dyn UserFileSystemResolver>) -> PathResolver {
        PathResolver::new(
            self.session_bucket.clone(),
            self.session_home.clone(),
            self.session_jail.clone(),
            users,
        )
    }
}

impl fmt::Debug for ServerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfiguration")
            .field("uri", &self.uri.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ServerConfigurationBuilder {
    uri: Option<Url>,
    session_bucket: Option<Arc<dyn SessionBucket>>,
    session_home: Option<Arc<dyn SessionHome>>,
    session_jail: Option<Arc<dyn SessionJail>>,
    path_enhancer: Option<Arc<dyn PathEnhancer>>,
}

impl ServerConfigurationBuilder {
    pub fn uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn session_bucket(mut self, bucket: Arc<dyn SessionBucket>) -> Self {
        self.session_bucket = Some(bucket);
        self
    }

    pub fn session_home(mut self, home: Arc<dyn SessionHome>) -> Self {
        self.session_home = Some(home);
        self
    }

    pub fn session_jail(mut self, jail: Arc<dyn SessionJail>) -> Self {
        self.session_jail = Some(jail);
        self
    }

    pub fn path_enhancer(mut self, enhancer: Arc<dyn PathEnhancer>) -> Self {
        self.path_enhancer = Some(enhancer);
        self
    }

    /// Build the configuration. The URI and bucket strategy are required;
    /// home defaults to `home/<username>`, the jail to none, and keys are
    /// not rewritten.
    pub fn build(self) -> Result<ServerConfiguration, ConfigurationError> {
        Ok(ServerConfiguration {
            uri: self.uri.ok_or(ConfigurationError::Missing("uri"))?,
            session_bucket: self
                .session_bucket
                .ok_or(ConfigurationError::Missing("session_bucket"))?,
            session_home: self
                .session_home
                .unwrap_or_else(|| strategy::per_user_home(DEFAULT_HOME_SUBDIR)),
            session_jail: self.session_jail.unwrap_or_else(strategy::no_jail),
            path_enhancer: self
                .path_enhancer
                .unwrap_or_else(<dyn PathEnhancer>::identity),
        })
    }
}

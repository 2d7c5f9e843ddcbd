//! On-disk configuration for the `s3sftp` binary.
//!
//! A single TOML file (by default `~/.config/s3sftp/config.toml`) holds the
//! endpoint, the session strategies, the storage backend and the credential
//! tables. [`AppConfig::build_gateway`] turns it into a wired-up
//! [`SftpGateway`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::config::{ConfigurationError, ServerConfiguration, DEFAULT_HOME_SUBDIR};
use common::prelude::*;
use common::strategy;
use serde::{Deserialize, Serialize};
use storage::{ObjectStoreConfig, Storage, StorageError};
use tracing::debug;
use url::Url;

pub const CONFIG_DIR_NAME: &str = "s3sftp";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0} (run `s3sftp init` first)")]
    NotFound(PathBuf),

    #[error("config file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to access config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid S3 URL: {0}")]
    InvalidS3Url(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Where the objects live.
///
/// Either a full backend table (`type = "memory" | "local" | "s3"`) or a
/// single `url = "s3://access:secret@host:port/bucket"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageConfig {
    Url { url: String },
    Backend(ObjectStoreConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URI of the object store endpoint, e.g. `s3://localhost:9000`
    pub uri: Url,
    /// Bucket every session works in
    pub bucket: String,
    /// Sub-directory holding per-user homes
    #[serde(default = "default_home")]
    pub home: String,
    /// Jail prefix; empty means no jail
    #[serde(default)]
    pub jail: String,
    /// Prefix prepended to every key before it reaches the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    pub storage: StorageConfig,
    /// Username to password
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Username to OpenSSH public keys
    #[serde(default)]
    pub authorized_keys: BTreeMap<String, Vec<String>>,
}

fn default_home() -> String {
    DEFAULT_HOME_SUBDIR.to_string()
}

/// Parts of an `s3://access:secret@host:port/bucket` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Url {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: Option<String>,
}

impl S3Url {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidS3Url(e.to_string()))?;
        if parsed.scheme() != "s3" {
            return Err(ConfigError::InvalidS3Url(
                "URL must start with s3://".to_string(),
            ));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidS3Url("missing host".to_string()))?;
        if parsed.username().is_empty() {
            return Err(ConfigError::InvalidS3Url("missing access key".to_string()));
        }
        let secret_key = parsed
            .password()
            .ok_or_else(|| ConfigError::InvalidS3Url("missing secret key".to_string()))?;

        let endpoint = match parsed.port() {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        };
        let bucket = parsed
            .path()
            .trim_matches('/')
            .split('/')
            .next()
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        Ok(Self {
            endpoint,
            access_key: parsed.username().to_string(),
            secret_key: secret_key.to_string(),
            bucket,
        })
    }
}

/// Hide the credentials of an S3 URL for display.
pub fn mask_s3_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("s3://") {
        if let Some(at_pos) = rest.find('@') {
            let host_bucket = &rest[at_pos..];
            return format!("s3://***:***{}", host_bucket);
        }
    }
    url.to_string()
}

impl AppConfig {
    /// `~/.config/s3sftp/config.toml`, falling back to `~/.config` when the
    /// platform has no config dir.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
        } else if let Some(home_dir) = dirs::home_dir() {
            home_dir
                .join(".config")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        } else {
            PathBuf::from(format!(".{CONFIG_DIR_NAME}")).join(CONFIG_FILE_NAME)
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Backend configuration with any S3 URL expanded.
    pub fn object_store_config(&self) -> Result<ObjectStoreConfig, ConfigError> {
        match &self.storage {
            StorageConfig::Backend(config) => Ok(config.clone()),
            StorageConfig::Url { url } => {
                let s3 = S3Url::parse(url)?;
                Ok(ObjectStoreConfig::S3 {
                    endpoint: s3.endpoint,
                    access_key: s3.access_key,
                    secret_key: s3.secret_key,
                    region: None,
                    buckets: vec![s3.bucket.unwrap_or_else(|| self.bucket.clone())],
                })
            }
        }
    }

    /// One-line description of the storage backend, credentials masked.
    pub fn storage_summary(&self) -> String {
        match &self.storage {
            StorageConfig::Url { url } => format!("s3 ({})", mask_s3_url(url)),
            StorageConfig::Backend(ObjectStoreConfig::S3 { endpoint, .. }) => {
                format!("s3 ({endpoint})")
            }
            StorageConfig::Backend(ObjectStoreConfig::Local { path }) => {
                format!("local ({})", path.display())
            }
            StorageConfig::Backend(ObjectStoreConfig::Memory { .. }) => "memory".to_string(),
        }
    }

    pub fn server_configuration(&self) -> Result<ServerConfiguration, ConfigError> {
        let mut builder = ServerConfiguration::builder()
            .uri(self.uri.clone())
            .session_bucket(strategy::simple_session_bucket(self.bucket.as_str()))
            .session_home(strategy::per_user_home(self.home.as_str()))
            .session_jail(strategy::fixed_jail(self.jail.as_str()));
        if let Some(prefix) = &self.path_prefix {
            builder = builder.path_enhancer(<dyn PathEnhancer>::fixed_prefix(prefix.as_str()));
        }
        Ok(builder.build()?)
    }

    pub async fn storage(&self) -> Result<Arc<Storage>, ConfigError> {
        Ok(Arc::new(Storage::new(self.object_store_config()?).await?))
    }

    /// Wire a gateway: storage, session strategies and the credential tables.
    pub async fn build_gateway(&self) -> Result<SftpGateway, ConfigError> {
        let storage = self.storage().await?;
        let mut builder = SftpGateway::builder(self.server_configuration()?, storage);

        if !self.users.is_empty() {
            let users = self.users.clone().into_iter().collect();
            builder = builder.password_authenticator(Arc::new(SimpleAuthenticator::new(users)));
        }
        if !self.authorized_keys.is_empty() {
            let keys = self.authorized_keys.clone().into_iter().collect();
            builder =
                builder.public_key_authenticator(Arc::new(AuthorizedKeysAuthenticator::new(keys)));
        }
        Ok(builder.build())
    }
}

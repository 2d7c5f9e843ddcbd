use std::fmt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use common::config::DEFAULT_HOME_SUBDIR;
use owo_colors::OwoColorize;
use storage::{ObjectStoreConfig, Storage, StorageError};
use url::Url;

use s3sftp_daemon::{AppConfig, ConfigError, S3Url, StorageConfig};

/// Storage backend type for CLI selection
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum StorageType {
    /// Directory on the local filesystem, one sub-directory per bucket (default)
    #[default]
    Local,
    /// In-memory, gone when the process exits
    Memory,
    /// S3-compatible object storage
    S3,
}

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Base URI of the object store endpoint
    #[arg(long, default_value = "s3://localhost:9000")]
    pub uri: Url,

    /// Bucket every session works in
    #[arg(long, default_value = "sftp")]
    pub bucket: String,

    /// Sub-directory holding per-user homes
    #[arg(long, default_value = DEFAULT_HOME_SUBDIR)]
    pub home: String,

    /// Jail prefix, empty for no jail
    #[arg(long, default_value = "")]
    pub jail: String,

    /// Prefix prepended to every key before it reaches the store
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Storage backend type
    #[arg(long, value_enum, default_value_t = StorageType::Local)]
    pub storage: StorageType,

    /// Data directory for --storage local (defaults to `data` next to the config file)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// S3/MinIO URL (required for --storage s3)
    /// Format: s3://access_key:secret_key@host:port/bucket
    #[arg(long)]
    pub s3_url: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug)]
pub struct InitOutput {
    pub config_path: PathBuf,
    pub uri: Url,
    pub bucket: String,
    pub home: String,
    pub jail: String,
    pub storage: String,
}

impl fmt::Display for InitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} config at {}",
            "Initialized".green().bold(),
            self.config_path.display().to_string().bold()
        )?;
        writeln!(f, "  {} {}", "Endpoint:".dimmed(), self.uri)?;
        writeln!(f, "  {} {}", "Bucket:".dimmed(), self.bucket)?;
        writeln!(f, "  {} {}", "Homes:".dimmed(), self.home)?;
        let jail = if self.jail.is_empty() {
            "none"
        } else {
            self.jail.as_str()
        };
        writeln!(f, "  {} {}", "Jail:".dimmed(), jail)?;
        write!(f, "  {} {}", "Storage:".dimmed(), self.storage)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    Config(#[from] ConfigError),

    #[error("init failed: {0}")]
    Storage(#[from] StorageError),

    #[error("missing required config: {0}")]
    MissingConfig(String),
}

impl Init {
    fn build_storage_config(&self, config_path: &std::path::Path) -> Result<StorageConfig, InitError> {
        match self.storage {
            StorageType::Local => {
                let path = match &self.data_dir {
                    Some(p) => p.clone(),
                    None => config_path
                        .parent()
                        .map(|dir| dir.join("data"))
                        .unwrap_or_else(|| PathBuf::from("data")),
                };
                Ok(StorageConfig::Backend(ObjectStoreConfig::Local { path }))
            }

            StorageType::Memory => Ok(StorageConfig::Backend(ObjectStoreConfig::Memory {
                buckets: vec![self.bucket.clone()],
            })),

            StorageType::S3 => {
                let url = self.s3_url.clone().ok_or_else(|| {
                    InitError::MissingConfig("--s3-url required for S3 storage".to_string())
                })?;

                S3Url::parse(&url)?;

                Ok(StorageConfig::Url { url })
            }
        }
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = InitOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        if ctx.config_path.exists() && !self.force {
            return Err(ConfigError::AlreadyExists(ctx.config_path.clone()).into());
        }

        let storage = self.build_storage_config(&ctx.config_path)?;
        let config = AppConfig {
            uri: self.uri.clone(),
            bucket: self.bucket.clone(),
            home: self.home.clone(),
            jail: self.jail.clone(),
            path_prefix: self.path_prefix.clone(),
            storage,
            users: Default::default(),
            authorized_keys: Default::default(),
        };

        // a local store needs the bucket directory up front
        if let StorageConfig::Backend(local @ ObjectStoreConfig::Local { .. }) = &config.storage {
            Storage::new(local.clone())
                .await?
                .create_bucket(&config.bucket)
                .await?;
        }

        config.save(&ctx.config_path)?;

        Ok(InitOutput {
            config_path: ctx.config_path.clone(),
            uri: config.uri.clone(),
            bucket: config.bucket.clone(),
            home: config.home.clone(),
            jail: config.jail.clone(),
            storage: config.storage_summary(),
        })
    }
}

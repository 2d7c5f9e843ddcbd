//! Operator side of the s3sftp gateway: the config file and local sessions
//! used by the `s3sftp` binary.

pub mod config;
pub mod session;

pub use config::{mask_s3_url, AppConfig, ConfigError, S3Url, StorageConfig};
pub use session::{open_local_session, LocalSession, SessionError};

use std::fmt;
use std::path::PathBuf;

use common::prelude::JailedSftpSubsystem;
use s3sftp_daemon::{open_local_session, AppConfig, ConfigError, SessionError};

/// Shared state handed to every command.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub config_path: PathBuf,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(AppConfig::default_path),
        }
    }

    pub fn config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(&self.config_path)
    }

    /// Open a local session for `username` against the configured store.
    pub async fn session(&self, username: &str) -> Result<JailedSftpSubsystem, SessionError> {
        let config = self.config()?;
        open_local_session(&config, username).await
    }
}

/// A CLI command.
#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: fmt::Display + fmt::Debug;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Generate a clap `Command` enum over a list of ops, together with the
/// matching `OpError` / `OpOutput` enums and an `Op` impl dispatching to
/// the selected variant.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $op:ty)),* $(,)?) => {
        #[derive(clap::Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($op),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$op as $crate::cli::op::Op>::Error),
            )*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$op as $crate::cli::op::Op>::Output),)*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(OpOutput::$variant(output) => write!(f, "{output}"),)*
                }
            }
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Error = OpError;
            type Output = OpOutput;

            async fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => op
                            .execute(ctx)
                            .await
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }
    };
}

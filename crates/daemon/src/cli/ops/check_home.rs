use std::fmt;
use std::sync::Arc;

use clap::Args;
use common::prelude::*;
use owo_colors::OwoColorize;

use s3sftp_daemon::{ConfigError, LocalSession};

/// Run the login-time home directory probe for a user
#[derive(Args, Debug, Clone)]
pub struct CheckHome {
    /// User to probe
    pub user: String,
}

#[derive(Debug)]
pub struct CheckHomeOutput {
    pub user: String,
    pub home: String,
    pub exists: bool,
}

impl fmt::Display for CheckHomeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.exists {
            "found".green().bold().to_string()
        } else {
            "missing".red().bold().to_string()
        };
        write!(
            f,
            "{} {}  {} {}  {}",
            "User:".dimmed(),
            self.user.bold(),
            "Home:".dimmed(),
            self.home,
            status
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckHomeError {
    #[error("{0}")]
    Config(#[from] ConfigError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for CheckHome {
    type Error = CheckHomeError;
    type Output = CheckHomeOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ctx.config()?;
        let configuration = Arc::new(config.server_configuration()?);
        let checker = DefaultHomeDirExistsChecker::new(configuration.clone(), config.storage().await?);

        let session = SftpSession::of(&LocalSession::new(self.user.as_str()));
        let home = format!(
            "/{}/{}",
            configuration.session_bucket().bucket(&session),
            configuration.session_home().home_path(&session)
        );
        let exists = checker.check(&session).await;

        Ok(CheckHomeOutput {
            user: self.user.clone(),
            home,
            exists,
        })
    }
}

use std::fmt;

use clap::Args;
use common::prelude::SubsystemError;
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// User whose session removes the path
    pub user: String,

    /// File (or, with --dir, empty directory) to remove
    pub path: String,

    /// Remove an empty directory instead of a file
    #[arg(long, short = 'd')]
    pub dir: bool,
}

#[derive(Debug)]
pub struct RmOutput {
    pub path: String,
}

impl fmt::Display for RmOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "Removed".green().bold(), self.path.bold())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = RmOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        if self.dir {
            session.remove_directory(&self.path).await?;
        } else {
            session.remove(&self.path).await?;
        }
        Ok(RmOutput {
            path: path.visible().to_string(),
        })
    }
}

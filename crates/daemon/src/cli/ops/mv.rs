use std::fmt;

use clap::Args;
use common::prelude::SubsystemError;
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

/// Rename a file (copy then delete; directories are not supported)
#[derive(Args, Debug, Clone)]
pub struct Mv {
    /// User whose session renames the file
    pub user: String,

    /// Existing file
    pub from: String,

    /// New path
    pub to: String,
}

#[derive(Debug)]
pub struct MvOutput {
    pub from: String,
    pub to: String,
}

impl fmt::Display for MvOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            "Moved".green().bold(),
            self.from,
            self.to.bold()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MvError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mv {
    type Error = MvError;
    type Output = MvOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let from = session.resolve_file(&self.from)?;
        let to = session.resolve_file(&self.to)?;
        session.rename(&self.from, &self.to).await?;
        Ok(MvOutput {
            from: from.visible().to_string(),
            to: to.visible().to_string(),
        })
    }
}

use std::fmt;

use clap::Args;
use common::prelude::SubsystemError;
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// User whose session creates the directory
    pub user: String,

    /// Directory to create
    pub path: String,
}

#[derive(Debug)]
pub struct MkdirOutput {
    pub path: String,
}

impl fmt::Display for MkdirOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", "Created".green().bold(), self.path.bold())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MkdirError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mkdir {
    type Error = MkdirError;
    type Output = MkdirOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        session.make_directory(&self.path).await?;
        Ok(MkdirOutput {
            path: path.visible().to_string(),
        })
    }
}

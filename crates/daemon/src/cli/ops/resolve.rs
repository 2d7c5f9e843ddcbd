use std::fmt;

use clap::Args;
use common::prelude::{BackingPath, SubsystemError};
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Resolve {
    /// User whose session resolves the path
    pub user: String,

    /// Path as an SFTP client would send it
    pub path: String,
}

#[derive(Debug)]
pub struct ResolveOutput {
    pub path: BackingPath,
}

impl fmt::Display for ResolveOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path.visible().bold())?;
        writeln!(f, "  {} {}", "Bucket:".dimmed(), self.path.bucket())?;
        let key = if self.path.is_bucket_root() {
            "(bucket root)"
        } else {
            self.path.key()
        };
        write!(f, "  {} {}", "Key:".dimmed(), key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolvePathError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Resolve {
    type Error = ResolvePathError;
    type Output = ResolveOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        Ok(ResolveOutput { path })
    }
}

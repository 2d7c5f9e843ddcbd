use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use common::prelude::SubsystemError;
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// User whose session writes the file
    pub user: String,

    /// Local file to upload
    pub source: PathBuf,

    /// Destination path
    pub path: String,

    /// Write into the existing file at this byte offset instead of replacing it
    #[arg(long)]
    pub offset: Option<u64>,
}

#[derive(Debug)]
pub struct PutOutput {
    pub path: String,
    pub size: usize,
}

impl fmt::Display for PutOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} bytes)",
            "Uploaded".green().bold(),
            self.path.bold(),
            self.size
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = PutOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = tokio::fs::read(&self.source)
            .await
            .map_err(|source| PutError::Read {
                path: self.source.clone(),
                source,
            })?;

        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        let size = data.len();
        match self.offset {
            Some(offset) => session.write_at(&self.path, offset, Bytes::from(data)).await?,
            None => session.write_file(&self.path, Bytes::from(data)).await?,
        }

        Ok(PutOutput {
            path: path.visible().to_string(),
            size,
        })
    }
}

use std::fmt;

use clap::Args;
use common::prelude::SubsystemError;
use owo_colors::OwoColorize;

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// User whose session reads the file
    pub user: String,

    /// File to read
    pub path: String,

    /// Start reading at this byte offset
    #[arg(long)]
    pub offset: Option<u64>,

    /// Read at most this many bytes
    #[arg(long, requires = "offset")]
    pub length: Option<u64>,
}

#[derive(Debug)]
pub enum CatContent {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug)]
pub struct CatOutput {
    pub path: String,
    pub size: usize,
    pub content: CatContent,
}

impl fmt::Display for CatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}  {} {} bytes",
            "File:".dimmed(),
            self.path.bold(),
            "Size:".dimmed(),
            self.size
        )?;
        match &self.content {
            CatContent::Text(text) => write!(f, "{text}"),
            CatContent::Binary(bytes) => {
                let hex = bytes
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{} {hex}", "Binary content (hex):".dimmed())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = CatOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        let bytes = match self.offset {
            Some(offset) => session
                .read_at(&self.path, offset, self.length.unwrap_or(u64::MAX))
                .await?
                .to_vec(),
            None => session.read_file(&self.path).await?.to_vec(),
        };

        let size = bytes.len();
        let content = match String::from_utf8(bytes) {
            Ok(text) => CatContent::Text(text),
            Err(e) => CatContent::Binary(e.into_bytes()),
        };

        Ok(CatOutput {
            path: path.visible().to_string(),
            size,
            content,
        })
    }
}

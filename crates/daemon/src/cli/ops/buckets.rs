use std::fmt;

use clap::Args;
use comfy_table::Table;
use common::prelude::SubsystemError;
use storage::{StorageClient, StorageError};

use s3sftp_daemon::{ConfigError, SessionError};

/// List the buckets a user's session can see
#[derive(Args, Debug, Clone)]
pub struct Buckets {
    /// User whose session lists the buckets
    pub user: String,

    /// List every bucket in the store instead
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug)]
pub struct BucketsOutput {
    pub buckets: Vec<String>,
}

impl fmt::Display for BucketsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.buckets.is_empty() {
            return write!(f, "No buckets found");
        }

        let mut table = Table::new();
        table.set_header(vec!["BUCKET"]);
        for bucket in &self.buckets {
            table.add_row(vec![bucket.clone()]);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BucketsError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
    #[error("{0}")]
    Storage(#[from] StorageError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Buckets {
    type Error = BucketsError;
    type Output = BucketsOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let buckets = if self.all {
            ctx.config()?.storage().await?.list_buckets().await?
        } else {
            ctx.session(&self.user).await?.file_stores().await?
        };
        Ok(BucketsOutput { buckets })
    }
}

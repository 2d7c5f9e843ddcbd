use std::fmt;

use clap::Args;
use comfy_table::Table;
use common::prelude::{Attributes, SubsystemError};

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Stat {
    /// User whose session reads the attributes
    pub user: String,

    /// Path to inspect
    pub path: String,
}

#[derive(Debug)]
pub struct StatOutput {
    pub path: String,
    pub attributes: Attributes,
}

impl fmt::Display for StatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.set_header(vec!["ATTRIBUTE", "VALUE"]);
        for (name, value) in &self.attributes {
            table.add_row(vec![name.clone(), value.to_string()]);
        }
        writeln!(f, "{}", self.path)?;
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Stat {
    type Error = StatError;
    type Output = StatOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let path = session.resolve_file(&self.path)?;
        let attributes = session.read_attributes(&self.path).await?;
        Ok(StatOutput {
            path: path.visible().to_string(),
            attributes,
        })
    }
}

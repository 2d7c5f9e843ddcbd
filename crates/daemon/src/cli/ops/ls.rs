use std::fmt;

use clap::Args;
use comfy_table::Table;
use common::attributes::{self, LAST_MODIFIED_TIME, PERMISSIONS, SIZE};
use common::prelude::{DirEntry, SubsystemError};

use s3sftp_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// User whose session lists the directory
    pub user: String,

    /// Directory to list (defaults to the user's home)
    #[arg(default_value = ".")]
    pub path: String,
}

#[derive(Debug)]
pub struct LsOutput {
    pub items: Vec<DirEntry>,
}

fn attribute(entry: &DirEntry, name: &str) -> String {
    entry
        .attributes
        .get(name)
        .map(ToString::to_string)
        .unwrap_or_default()
}

impl fmt::Display for LsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "No items found");
        }

        let mut table = Table::new();
        table.set_header(vec!["TYPE", "MODE", "SIZE", "MODIFIED", "NAME"]);
        for item in &self.items {
            let type_str = if attributes::is_directory(&item.attributes) {
                "dir"
            } else {
                "file"
            };
            table.add_row(vec![
                type_str.to_string(),
                attribute(item, PERMISSIONS),
                attribute(item, SIZE),
                attribute(item, LAST_MODIFIED_TIME),
                item.name.clone(),
            ]);
        }
        write!(f, "{table}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Subsystem(#[from] SubsystemError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = LsOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session(&self.user).await?;
        let items = session.read_directory(&self.path).await?;
        Ok(LsOutput { items })
    }
}

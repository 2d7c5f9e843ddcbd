use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::{Buckets, Cat, CheckHome, Init, Ls, Mkdir, Mv, Put, Resolve, Rm, Stat};

crate::command_enum! {
    (Init, Init),
    (Resolve, Resolve),
    (Stat, Stat),
    (Ls, Ls),
    (Cat, Cat),
    (Put, Put),
    (Mkdir, Mkdir),
    (Mv, Mv),
    (Rm, Rm),
    (CheckHome, CheckHome),
    (Buckets, Buckets),
}

/// SFTP gateway over object storage
#[derive(Parser, Debug)]
#[command(name = "s3sftp", version, about)]
struct Cli {
    /// Config file (default: ~/.config/s3sftp/config.toml)
    #[arg(long, global = true, env = "S3SFTP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(cli.log_level.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = OpContext::new(cli.config);
    let output = cli.command.execute(&ctx).await?;
    println!("{output}");
    Ok(())
}

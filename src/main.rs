use anyhow::Result;
use bluree_cli::{cli, logging};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init(
        &args.log_level,
        args.log_file.as_deref(),
        args.is_interactive(),
    )?;

    cli::run(args).await
}

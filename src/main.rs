use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use epub_inspector::{cli::Cli, scanner};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let summary = scanner::run_to_stdout(&cli.dir, &cli.extension)
        .with_context(|| format!("Failed to scan {}", cli.dir.display()))?;
    debug!("{:?}", summary);

    Ok(())
}

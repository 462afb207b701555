//! modinst CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use modinst_cli::cmd;
use modinst_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("modinst=debug")
    } else if cli.quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modinst=info"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Install { dir, upgrade } => {
            let settings = cli.settings(dir)?;
            cmd::install::install(&settings, dir, *upgrade, cli.quiet)
        }
        Commands::List { dir } => {
            let settings = cli.settings(dir)?;
            cmd::list::list(&settings)
        }
        Commands::Completions { shell } => {
            cmd::completions::completions(*shell);
            Ok(())
        }
    }
}

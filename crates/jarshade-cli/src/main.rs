//! jarshade CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jarshade_cli::cmd;
use jarshade_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Build {
            targets,
            project,
            jobs,
            json,
        } => cmd::build::build(&project, &targets, jobs, json, dry_run).await,
        Commands::Check { project } => cmd::check::check(&project),
        Commands::Inspect { archive, classes } => cmd::inspect::inspect(&archive, classes),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}

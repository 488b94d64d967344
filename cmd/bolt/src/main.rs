//! Bolt CLI - inspect and edit a bucket store from the command line.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use giztoy_bolt::Db;

mod commands;
mod config;

use commands::{Commands, render};
use config::Config;

/// Bolt CLI - inspect and edit a bucket store.
///
/// Keys are addressed by paths of bucket names followed by a key:
///   bolt set users alice A1
///   bolt get users alice
///   bolt scan users --prefix a
///
/// Configuration is read from ~/.giztoy/bolt/config.yaml when present.
#[derive(Parser)]
#[command(name = "bolt")]
#[command(about = "Bucket store CLI tool")]
#[command(version)]
pub struct Cli {
    /// Database file (default is ~/.giztoy/bolt/data/bolt.redb)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default is ~/.giztoy/bolt/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    }

    let cfg = Config::load(cli.config.as_deref())?;
    let path = cfg.db_path(cli.db.as_deref())?;
    let db = Db::open_with(&path, &cfg.options)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let outcome = cli.command.run(&db)?;
    if let Some(text) = render(&outcome, cli.json)? {
        println!("{}", text);
    }

    db.close();
    Ok(())
}

mod clean;
mod glob_util;
mod scan;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

pub use clean::CleanArgs;

#[derive(Parser)]
#[command(name = "sql-cleaner")]
#[command(version)]
#[command(
    about = "Clean MySQL/MariaDB dump files for import into newer servers",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Unwrap legacy versioned comments and normalize DDL in a dump
    Clean(CleanArgs),

    /// Report the versioned comments in a dump without changing it
    Scan {
        /// Input SQL file or glob pattern (e.g., *.sql, dumps/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Comments below this version would be unwrapped
        #[arg(long, default_value_t = crate::scanner::unwrap::DEFAULT_VERSION_THRESHOLD)]
        version_threshold: u32,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Clean(args) => clean::run(args),
        Commands::Scan {
            file,
            version_threshold,
            json,
        } => scan::run(file, version_threshold, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "sql-cleaner",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

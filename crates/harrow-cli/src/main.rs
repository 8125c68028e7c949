//! harrow command line.
//!
//! Deterministic consistency testing: generate a reproducible write stream
//! from a seed and drive it into a store.
//!
//! # Quick Start
//!
//! ```bash
//! # Visit 10,000 lts with seed 7 against the in-memory store
//! harrow run --seed 7 --max-lts 10000
//!
//! # Check that injected faults are visible on read
//! harrow run --corrupt
//!
//! # Print the effective configuration
//! harrow config
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

/// harrow - deterministic consistency testing for partitioned stores.
#[derive(Parser)]
#[command(name = "harrow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where configuration comes from.
#[derive(clap::Args, Clone)]
struct ConfigSource {
    /// Project directory holding harrow.toml and harrow.local.toml.
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Read this TOML file instead of the layered project configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and apply writes against the in-memory store.
    Run {
        #[command(flatten)]
        source: ConfigSource,

        /// Seed of the descriptor stream.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of lts to visit, starting at zero.
        #[arg(short = 'n', long)]
        max_lts: Option<u64>,

        /// Worker threads (0 lets the pool decide).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Corrupt visited partitions afterwards and check the faults are read back.
        #[arg(long)]
        corrupt: bool,
    },

    /// Print the effective configuration.
    Config {
        #[command(flatten)]
        source: ConfigSource,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Text,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            seed,
            max_lts,
            workers,
            corrupt,
        } => {
            let mut config = commands::load(&source.project, source.config.as_deref())?;
            if let Some(seed) = seed {
                config.run.seed = seed;
            }
            if let Some(max_lts) = max_lts {
                config.run.max_lts = max_lts;
            }
            if let Some(workers) = workers {
                config.run.workers = workers;
            }
            config.validation.corrupt |= corrupt;
            commands::run::run(&config)
        }
        Commands::Config { source, format } => {
            let config = commands::load(&source.project, source.config.as_deref())?;
            match format {
                Format::Toml => commands::config::show_toml(&config),
                Format::Text => commands::config::show_text(&config),
            }
        }
    }
}

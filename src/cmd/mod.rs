mod create;
mod ddl;
mod order;
mod seed;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rental-seed")]
#[command(version)]
#[command(about = "Create the video-rental schema and fill it with consistent synthetic data", long_about = None)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where synthetic attribute values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Built-in word lists, no external data
    Lists,
    /// Realistic English names and places from the fake crate
    Faker,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create every table of the schema (idempotent)
    Create {
        /// DuckDB database file, or :memory:
        #[arg(long, default_value = "rental.duckdb")]
        db: String,
    },

    /// Create the schema and seed a complete data set
    Seed {
        /// DuckDB database file, or :memory:
        #[arg(long, default_value = "rental.duckdb")]
        db: String,

        /// YAML seed configuration (row counts, name lists, date window)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Synthetic value source
        #[arg(long, value_enum, default_value = "faker")]
        source: SourceKind,

        /// Check every invariant after seeding (non-zero exit on issues)
        #[arg(long)]
        verify: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the dependency order and deferred references
    Order {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print CREATE TABLE statements for a SQL dialect
    Ddl {
        /// SQL dialect: mysql, postgres, sqlite, duckdb
        #[arg(short, long, default_value = "duckdb")]
        dialect: String,
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
        Commands::Create { db } => create::run(db),
        Commands::Seed {
            db,
            config,
            seed,
            source,
            verify,
            json,
        } => seed::run(seed::SeedOptions {
            db,
            config,
            seed,
            source,
            verify,
            json,
        }),
        Commands::Order { json } => order::run(json),
        Commands::Ddl { dialect } => ddl::run(dialect),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "rental-seed",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

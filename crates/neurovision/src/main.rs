//! NeuroVision CLI - Dependency graph and impact analysis from the command line.
//!
//! Every command scans the project first; the graph lives only for the
//! duration of the command.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// NeuroVision: Live dependency graph for AI coding agents.
#[derive(Parser)]
#[command(name = "neurovision")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file (defaults to <root>/.neurovision.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the project and print a summary
    Scan,

    /// Show which files are affected by changing a file
    Impact {
        /// File path (relative to the root or absolute), node id, or path suffix
        target: String,

        /// Stop after this many hops
        #[arg(long)]
        max_hops: Option<u32>,

        /// Hide dependents scoring below this confidence (0.0 - 1.0)
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Witness paths to show per dependent
        #[arg(long)]
        paths: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a JSON snapshot of the graph
    Graph {
        /// Only include files at most this many directories deep
        #[arg(long)]
        max_depth: Option<usize>,

        /// Leave out external (unresolved) nodes
        #[arg(long)]
        no_external: bool,
    },

    /// Show node and edge counts
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = match cli.root {
        Some(r) => r,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Scan => cli::scan::run(&root, config),
        Commands::Impact {
            target,
            max_hops,
            min_confidence,
            paths,
            json,
        } => cli::impact::run(
            &root,
            config,
            &target,
            &cli::impact::ImpactArgs {
                max_hops,
                min_confidence,
                paths,
                json,
            },
        ),
        Commands::Graph {
            max_depth,
            no_external,
        } => cli::graph::run(&root, config, max_depth, !no_external),
        Commands::Stats => cli::stats::run(&root, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}

//! Forge CLI - Command-line interface for iterative application builds.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Estimate, plan and run iterative application builds", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate complexity, tokens, iterations and price for a requirements document
    Estimate {
        /// Requirements document (markdown or plain text)
        prd: PathBuf,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the planned todo list
    Plan {
        /// Requirements document
        prd: PathBuf,
        /// Override the iteration count chosen by the estimator
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Parse one iteration's raw generator output
    Parse {
        /// File holding the raw output
        input: PathBuf,
        /// Write the parsed files under this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a generated project tree
    Validate {
        /// Root of the generated project
        dir: PathBuf,
    },
    /// Run a build, replaying recorded generator output
    Build {
        /// Requirements document
        prd: PathBuf,
        /// Payment session id
        #[arg(long)]
        session: Option<String>,
        /// Directory holding iteration-N.txt files
        #[arg(long)]
        replay: PathBuf,
        /// Write the final file set under this directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Build id (generated when omitted)
        #[arg(long)]
        build_id: Option<String>,
        /// Resume from the recovery snapshot for --build-id
        #[arg(long)]
        resume: bool,
    },
    /// Inspect the recovery store
    Recovery {
        #[command(subcommand)]
        command: RecoveryCommands,
    },
}

#[derive(Subcommand)]
enum RecoveryCommands {
    /// List stored snapshots
    List,
    /// Show one snapshot
    Show {
        /// Build id
        build_id: String,
    },
    /// Delete one snapshot
    Clear {
        /// Build id
        build_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate { prd, format } => commands::estimate::run(&prd, &format),
        Commands::Plan { prd, iterations } => commands::plan::run(&prd, iterations),
        Commands::Parse { input, out } => commands::parse::run(&input, out.as_deref()),
        Commands::Validate { dir } => commands::validate::run(&dir),
        Commands::Build {
            prd,
            session,
            replay,
            out,
            build_id,
            resume,
        } => {
            let options = commands::build::BuildOptions {
                prd,
                session,
                replay,
                out,
                build_id,
                resume,
            };
            commands::build::run(options).await
        }
        Commands::Recovery { command } => match command {
            RecoveryCommands::List => commands::recovery::list(),
            RecoveryCommands::Show { build_id } => commands::recovery::show(&build_id),
            RecoveryCommands::Clear { build_id } => commands::recovery::clear(&build_id),
        },
    }
}

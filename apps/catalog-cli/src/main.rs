use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use commands::{eval, index, search};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Hybrid lexical + vector search over indexed document chunks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search commands for exercising retrieval methods
    #[command(subcommand)]
    Search(SearchCommands),
    /// Retrieval quality evaluation
    #[command(subcommand)]
    Eval(EvalCommands),
    /// Index chunk records (JSON lines) into the text index and vector store
    Index(index::IndexArgs),
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Run fts, vector, hybrid and hybrid+rerank for one query
    Methods(search::MethodsArgs),
}

#[derive(Subcommand)]
enum EvalCommands {
    /// Run the golden query set and report hit@k
    Golden(eval::GoldenArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Search(SearchCommands::Methods(args)) => search::run_methods(args).await?,
        Commands::Eval(EvalCommands::Golden(args)) => eval::run_golden(args).await?,
        Commands::Index(args) => index::run(args).await?,
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Directory relative config paths resolve against.
pub(crate) fn base_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

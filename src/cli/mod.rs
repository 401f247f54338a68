//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;
pub mod progress;

/// rag-eval - Build KNN, lexical and hybrid queries and score them with Hit Rate and MRR
#[derive(Parser, Debug)]
#[command(name = "rag-eval")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable machine-readable JSON output
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Output format (human, json, jsonl, tsv)
    #[arg(long, short = 'O', global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ./rag-eval.toml over ~/.config/rag-eval/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_args(self.machine, self.output_format)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assign ids and encode the three vector fields of a passage corpus
    Embed(commands::embed::EmbedArgs),

    /// Recreate the search index and ingest an encoded corpus
    Index(commands::index::IndexArgs),

    /// Run one query with a retrieval strategy
    Search(commands::search::SearchArgs),

    /// Score retrieval strategies against labeled queries
    Eval(commands::eval::EvalArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}

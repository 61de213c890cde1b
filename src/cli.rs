use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Positional inverted-index search engine", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand that opens an index.
#[derive(clap::Args, Debug)]
pub struct IndexArgs {
    /// Index name (used as the key prefix on remote backends)
    #[arg(short, long, default_value = "quarry")]
    pub index: String,

    /// Storage backend
    #[arg(short, long, default_value = "memory", value_parser = ["memory", "embedded", "remote", "relational"])]
    pub backend: String,

    /// Backend location: data directory (embedded), database file
    /// (relational), or server URL (remote)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Snapshot file to restore on open (memory backend only)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Keep stop words instead of dropping them
    #[arg(long = "no-stopwords")]
    pub no_stopwords: bool,

    /// Skip Porter stemming
    #[arg(long = "no-stemming")]
    pub no_stemming: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an index from a JSON-lines document file
    Build {
        #[command(flatten)]
        index: IndexArgs,

        /// Input documents, one JSON object per line:
        /// {"id": "...", "text": "...", "metadata": {...}}
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Write a whole-index snapshot after the build (memory backend only)
        #[arg(long = "snapshot-out")]
        snapshot_out: Option<PathBuf>,
    },

    /// Run a query against an existing index
    Query {
        #[command(flatten)]
        index: IndexArgs,

        /// Evaluation mode
        #[arg(short, long, default_value = "ranked", value_parser = ["ranked", "boolean", "phrase", "taat", "daat"])]
        mode: String,

        /// Maximum number of results to return
        #[arg(long = "top-k", default_value_t = 10)]
        top_k: usize,

        /// Query text
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Print index counters and latency percentiles as JSON
    Metrics {
        #[command(flatten)]
        index: IndexArgs,
    },
}

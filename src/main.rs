use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use quarry::{AnalyzerOptions, BackendConfig, IndexConfig, Metadata, SearchIndex};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

mod cli;

use cli::{Args, Command, IndexArgs};

#[derive(Debug, Deserialize)]
struct InputDocument {
    id: String,
    text: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Build {
            index,
            input,
            snapshot_out,
        } => build(&index, &input, snapshot_out.as_deref()),
        Command::Query {
            index,
            mode,
            top_k,
            query,
        } => run_query(&index, &mode, top_k, &query),
        Command::Metrics { index } => print_metrics(&index),
    }
}

fn open_index(args: &IndexArgs) -> Result<SearchIndex> {
    let backend = match args.backend.as_str() {
        "memory" => BackendConfig::Memory,
        "embedded" => BackendConfig::Embedded {
            path: PathBuf::from(require_target(args, "data directory")?),
        },
        "remote" => BackendConfig::Remote {
            url: require_target(args, "server URL")?,
        },
        "relational" => BackendConfig::Relational {
            path: PathBuf::from(require_target(args, "database file")?),
        },
        other => return Err(anyhow!("unsupported backend '{other}'")),
    };

    let mut config = IndexConfig::in_memory(&args.index)
        .with_backend(backend)
        .with_analyzer(AnalyzerOptions {
            use_stopwords: !args.no_stopwords,
            use_stemming: !args.no_stemming,
        });
    if let Some(snapshot) = &args.snapshot {
        config = config.with_snapshot(snapshot);
    }
    Ok(SearchIndex::open(config)?)
}

fn require_target(args: &IndexArgs, what: &str) -> Result<String> {
    args.target
        .clone()
        .ok_or_else(|| anyhow!("--target <{what}> is required for the {} backend", args.backend))
}

fn build(args: &IndexArgs, input: &std::path::Path, snapshot_out: Option<&std::path::Path>) -> Result<()> {
    let index = open_index(args)?;
    let file =
        File::open(input).with_context(|| format!("opening input file {}", input.display()))?;

    let mut count = 0usize;
    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: InputDocument = serde_json::from_str(&line)
            .with_context(|| format!("parsing document on line {}", line_number + 1))?;
        index.add_document(&document.id, &document.text, document.metadata)?;
        count += 1;
    }

    if let Some(path) = snapshot_out {
        index.snapshot(path)?;
    }

    let report = index.metrics()?;
    println!(
        "indexed {count} documents ({} terms) in {:.3}s",
        report.term_count, report.indexing_time_secs
    );
    Ok(())
}

fn run_query(args: &IndexArgs, mode: &str, top_k: usize, query: &str) -> Result<()> {
    let index = open_index(args)?;
    let hits = match mode {
        "ranked" => index.search(query, top_k)?,
        "boolean" => index.boolean_search(query)?,
        "phrase" => index.phrase_search(query, top_k)?,
        "taat" => index.search_taat(&index.analyzer().analyze(query), top_k)?,
        "daat" => index.search_daat(&index.analyzer().analyze(query), top_k)?,
        other => return Err(anyhow!("unsupported mode '{other}'")),
    };

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.body.chars().take(80).collect();
        println!(
            "{:>3}. {}  score={:.6}  {}",
            rank + 1,
            hit.doc_id,
            hit.score,
            excerpt
        );
    }
    Ok(())
}

fn print_metrics(args: &IndexArgs) -> Result<()> {
    let index = open_index(args)?;
    let report = index.metrics()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! `ompgen` — extract structured patterns from compiler regression
//! tests and serve ranked similarity queries over them.

mod pipeline;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use ompgen_extract::finder::DEFAULT_EXTENSIONS;
use ompgen_extract::Stage;
use ompgen_extract::StrategyKind;
use ompgen_store::PatternRepository;
use ompgen_store::RetrievalEngine;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ompgen", about = "OpenMP test pattern extraction and retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a corpus of test files and store the extracted patterns.
    Ingest {
        /// Directory tree of test sources.
        #[arg(long)]
        corpus: PathBuf,
        /// Pattern database location.
        #[arg(long, default_value = "patterns.db")]
        db: PathBuf,
        /// Extraction strategy: auto, tree, or regex.
        #[arg(long, default_value = "auto")]
        strategy: StrategyKind,
        /// Comma-separated file extensions to scan.
        #[arg(long, value_delimiter = ',')]
        ext: Vec<String>,
    },
    /// Print ranked pattern summaries for a compiler stage.
    Query {
        #[arg(long, default_value = "patterns.db")]
        db: PathBuf,
        /// Stage to retrieve: parse, sema, or codegen.
        #[arg(long)]
        stage: Stage,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Print repository statistics.
    Stats {
        #[arg(long, default_value = "patterns.db")]
        db: PathBuf,
    },
    /// Export every stored pattern as JSON.
    Export {
        #[arg(long, default_value = "patterns.db")]
        db: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Remove one stored test by identity.
    Remove {
        #[arg(long, default_value = "patterns.db")]
        db: PathBuf,
        #[arg(long)]
        identity: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Ingest {
            corpus,
            db,
            strategy,
            ext,
        } => {
            let repository = PatternRepository::open(&db)
                .with_context(|| format!("cannot open pattern store at {}", db.display()))?;
            let extensions: Vec<&str> = if ext.is_empty() {
                DEFAULT_EXTENSIONS.to_vec()
            } else {
                ext.iter().map(String::as_str).collect()
            };
            let report = pipeline::ingest_corpus(&corpus, &repository, strategy, &extensions)?;
            if report.ingested == 0 {
                anyhow::bail!("no patterns were extracted from {}", corpus.display());
            }
            let stats = repository.stats()?;
            tracing::info!("stage distribution: {:?}", stats.by_stage);
            tracing::info!("category distribution: {:?}", stats.by_category);
            Ok(())
        }
        Command::Query { db, stage, limit } => {
            let repository = PatternRepository::open(&db)
                .with_context(|| format!("cannot open pattern store at {}", db.display()))?;
            let engine = RetrievalEngine::new(repository);
            for summary in engine.retrieve_similar(stage, limit)? {
                println!("{summary}\n");
            }
            Ok(())
        }
        Command::Stats { db } => {
            let repository = PatternRepository::open(&db)
                .with_context(|| format!("cannot open pattern store at {}", db.display()))?;
            let stats = repository.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Export { db, output } => {
            let repository = PatternRepository::open(&db)
                .with_context(|| format!("cannot open pattern store at {}", db.display()))?;
            let file = File::create(&output)
                .with_context(|| format!("cannot create {}", output.display()))?;
            repository.export_json(file)?;
            println!("exported to {}", output.display());
            Ok(())
        }
        Command::Remove { db, identity } => {
            let repository = PatternRepository::open(&db)
                .with_context(|| format!("cannot open pattern store at {}", db.display()))?;
            // Unknown identities are a successful no-op by contract.
            let removed = repository.remove(&identity)?;
            println!(
                "{}",
                if removed { "removed" } else { "not present" }
            );
            Ok(())
        }
    }
}

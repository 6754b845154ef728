/// symdex: hybrid code search over a symbol graph
///
/// Commands:
/// - index: sweep a repository (or an explicit file list) into the index
/// - search: keyword / semantic / hybrid queries with ranked JSON output
/// - stats: aggregate index statistics
///
/// stdout carries machine-readable JSON; human progress and logs go to
/// stderr and the storage logs directory.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use symdex::indexer::{CancelToken, SymbolGraphIndexer};
use symdex::{IndexerConfig, SearchMethod, StorageConfig, SweepStats};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(about = "Hybrid code search: symbol graph indexing with BM25 + semantic fusion", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository into the symbol graph
    Index {
        /// Repository root to index
        repository_path: PathBuf,

        /// Restrict the sweep to these files (repo-relative or absolute)
        #[arg(short, long, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Include globs (comma-separated), replacing the defaults
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Exclude globs (comma-separated), replacing the defaults
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Drop all derived state before the sweep
        #[arg(long)]
        force_clean: bool,

        /// Parse worker pool size
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Search the index
    Search {
        /// Repository root the index belongs to
        repository_path: PathBuf,

        /// Query text
        query: String,

        /// keyword, semantic or hybrid
        #[arg(short, long, default_value = "hybrid")]
        method: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Print aggregate index statistics
    Stats {
        /// Repository root the index belongs to
        repository_path: PathBuf,
    },
}

#[derive(Serialize)]
struct StorageReport {
    sqlite_path: String,
    sqlite_size_mb: f64,
    lancedb_path: String,
    lancedb_size_mb: f64,
}

#[derive(Serialize)]
struct IndexReport {
    status: String,
    files_indexed: usize,
    symbols_extracted: usize,
    embeddings_generated: usize,
    duration_ms: u64,
    storage: StorageReport,
    cache_hit_rate: f32,
    warnings: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            repository_path,
            files,
            include,
            exclude,
            force_clean,
            max_workers,
        } => {
            let mut config = IndexerConfig::from_env();
            if !include.is_empty() {
                config.include = include;
            }
            if !exclude.is_empty() {
                config.exclude = exclude;
            }
            if let Some(workers) = max_workers {
                config.max_workers = workers.max(1);
            }
            run_index(&repository_path, config, files, force_clean).await
        }
        Commands::Search {
            repository_path,
            query,
            method,
            limit,
        } => run_search(&repository_path, &query, &method, limit).await,
        Commands::Stats { repository_path } => run_stats(&repository_path).await,
    }
}

/// Route logs to the storage logs directory; stderr only gets warnings so
/// stdout stays clean for JSON.
fn init_logging(storage: &StorageConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL").map(|level| EnvFilter::new(format!("symdex={level}")))
        })
        .unwrap_or_else(|_| EnvFilter::new("symdex=info"));

    let logs_dir = storage.logs_path("");
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("cannot create logs directory {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "symdex.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(non_blocking.and(std::io::stderr.with_max_level(tracing::Level::WARN)))
        .init();

    Ok(guard)
}

fn open_logging(repository_path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let storage = symdex::storage::resolve(repository_path, None)?;
    symdex::storage::ensure(&storage)?;
    init_logging(&storage)
}

/// Cancel the sweep on ctrl-c; in-flight transactions finish first.
fn wire_ctrl_c(cancel: &CancelToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancellation requested, finishing current file...");
            cancel.cancel();
        }
    });
}

async fn run_index(
    repository_path: &Path,
    config: IndexerConfig,
    files: Vec<PathBuf>,
    force_clean: bool,
) -> Result<()> {
    let _guard = open_logging(repository_path)?;

    let mut indexer = SymbolGraphIndexer::initialize_with(
        repository_path,
        config.clone(),
        std::sync::Arc::new(symdex::embeddings::HttpEmbeddingClient::new(
            config.embedding.clone(),
        )?),
    )
    .await?;

    if force_clean {
        eprintln!("force-clean: dropping derived state");
        indexer.clear()?;
    }

    let cancel = CancelToken::new();
    wire_ctrl_c(&cancel);

    eprintln!("indexing {}...", indexer.project_root().display());
    let stats = if files.is_empty() {
        indexer.index_repository(&cancel).await?
    } else {
        indexer.index_files(&files, &cancel).await?
    };

    let report = build_report(indexer.storage(), &stats);
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        indexed = stats.indexed,
        already = stats.already_indexed,
        "index command complete"
    );
    indexer.close().await?;
    Ok(())
}

async fn run_search(
    repository_path: &Path,
    query: &str,
    method: &str,
    limit: usize,
) -> Result<()> {
    let _guard = open_logging(repository_path)?;
    let method: SearchMethod = method.parse()?;

    let indexer = SymbolGraphIndexer::initialize(repository_path).await?;
    let hits = match method {
        SearchMethod::Keyword => indexer.search_keyword(query, limit)?,
        SearchMethod::Semantic => indexer.search_semantic(query, limit).await?,
        SearchMethod::Hybrid => indexer.search_hybrid(query, limit).await?,
    };

    println!("{}", serde_json::to_string_pretty(&hits)?);
    indexer.close().await?;
    Ok(())
}

async fn run_stats(repository_path: &Path) -> Result<()> {
    let _guard = open_logging(repository_path)?;

    let indexer = SymbolGraphIndexer::initialize(repository_path).await?;
    let stats = indexer.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    indexer.close().await?;
    Ok(())
}

fn build_report(storage: &StorageConfig, stats: &SweepStats) -> IndexReport {
    let sqlite_dir = storage.base_dir.join("sqlite");
    let lancedb_dir = storage.vector_db_path();

    IndexReport {
        status: if stats.errors.is_empty() {
            "ok".to_string()
        } else {
            "completed_with_warnings".to_string()
        },
        files_indexed: stats.indexed,
        symbols_extracted: stats.total_symbols,
        embeddings_generated: stats.files_with_embeddings,
        duration_ms: stats.duration_ms,
        storage: StorageReport {
            sqlite_path: sqlite_dir.display().to_string(),
            sqlite_size_mb: dir_size_mb(&sqlite_dir),
            lancedb_path: lancedb_dir.display().to_string(),
            lancedb_size_mb: dir_size_mb(&lancedb_dir),
        },
        cache_hit_rate: stats.cache_hit_rate(),
        warnings: stats
            .errors
            .iter()
            .map(|e| format!("{}: {}: {}", e.path, e.kind, e.message))
            .collect(),
    }
}

fn dir_size_mb(dir: &Path) -> f64 {
    let mut bytes = 0u64;
    for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
        if entry.file_type().is_file() {
            bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

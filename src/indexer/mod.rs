// Symbol graph indexer
//
// The orchestrator: owns the relational store, the AST cache, the BM25
// index, the vector store and the embedding queue, and runs the sweep
// pipeline (discovery -> change detection -> parse -> persist -> embed) plus
// the three search paths. Per-file persistence is atomic. Parse, read and
// embedding failures are collected into the sweep stats and the sweep
// continues; a store failure aborts the sweep with prior state intact.

mod discovery;
mod stats;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{AstCache, CacheEntry, content_hash};
use crate::database::{FileRecord, SymbolStore};
use crate::embeddings::{
    EmbeddingConfig, EmbeddingProvider, EmbeddingQueue, HttpEmbeddingClient,
    QueueMetricsSnapshot, VectorRow, VectorSearchResult, VectorStore,
};
use crate::errors::{IndexError, Result};
use crate::extractors::{OutlineNode, ParseResult, ParserRegistry};
use crate::partition::PartitionClassifier;
use crate::search::{
    Bm25DocMeta, Bm25Index, Bm25Params, BoostConfig, RrfConfig, bm25::snippet_for, fuse,
};
use crate::storage::{self, StorageConfig};

pub use discovery::{default_exclude, default_include, discover_files};
pub use stats::{IndexStats, SweepError, SweepStats};

/// Env override for the parse worker pool size.
pub const INDEX_MAX_WORKERS_ENV: &str = "INDEX_MAX_WORKERS";

/// Cooperative cancellation flag, checked at file-loop boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Keyword,
    Semantic,
    Hybrid,
}

impl std::str::FromStr for SearchMethod {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(IndexError::config(format!(
                "unknown search method '{other}' (expected keyword, semantic or hybrid)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HitMetadata {
    pub partition: String,
    pub authority: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file: String,
    pub score: f32,
    pub snippet: String,
    pub method: SearchMethod,
    pub metadata: HitMetadata,
}

/// Monotone authority reweighting curve, clamped to [0, 1].
pub fn authority_factor(authority: f32) -> f32 {
    (0.5 + 0.5 * authority).clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_workers: usize,
    /// Upper bound (chars) on the content snippet sent for embedding.
    pub snippet_max_chars: usize,
    pub search_deadline: Duration,
    pub rrf_c: f32,
    pub bm25: Bm25Params,
    pub embedding: EmbeddingConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            max_workers: 4,
            snippet_max_chars: 8192,
            search_deadline: Duration::from_secs(5),
            rrf_c: 60.0,
            bm25: Bm25Params::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Defaults with env overrides applied (INDEX_MAX_WORKERS plus the
    /// embedding service vars).
    pub fn from_env() -> Self {
        let mut config = Self {
            embedding: EmbeddingConfig::from_env(),
            ..Default::default()
        };
        if let Ok(workers) = std::env::var(INDEX_MAX_WORKERS_ENV) {
            if let Ok(n) = workers.trim().parse::<usize>() {
                if n > 0 {
                    config.max_workers = n;
                }
            }
        }
        config
    }
}

/// Outcome of the parallel read/hash/parse phase for one file.
enum FileOutcome {
    Unchanged {
        rel: String,
    },
    Parsed(Box<ParsedFile>),
    Failed {
        rel: String,
        kind: &'static str,
        message: String,
    },
    Cancelled,
}

struct ParsedFile {
    rel: String,
    language: String,
    content: String,
    hash: String,
    mtime: DateTime<Utc>,
    size: u64,
    result: ParseResult,
    cache_hit: bool,
}

struct EmbedJob {
    rel: String,
    text: String,
    hash: String,
    partition: String,
    authority: f32,
}

pub struct SymbolGraphIndexer {
    project_root: PathBuf,
    storage: StorageConfig,
    store: SymbolStore,
    cache: Arc<Mutex<AstCache>>,
    bm25: Bm25Index,
    vectors: VectorStore,
    queue: Option<EmbeddingQueue>,
    classifier: PartitionClassifier,
    config: IndexerConfig,
    collection: String,
}

impl SymbolGraphIndexer {
    /// Resolve storage, open every store, ensure the schema, rehydrate the
    /// BM25 index, and connect the embedding queue to the HTTP service.
    pub async fn initialize(project_root: &Path) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingClient::new(
            EmbeddingConfig::from_env(),
        )?);
        Self::initialize_with(project_root, IndexerConfig::from_env(), provider).await
    }

    /// Initialization seam used by tests and embedders other than the HTTP
    /// client.
    pub async fn initialize_with(
        project_root: &Path,
        config: IndexerConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        // Bad globs are fatal here, not at first sweep.
        discovery::build_globset(&config.include)?;
        discovery::build_globset(&config.exclude)?;

        let project_root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());

        let storage = storage::resolve(&project_root, None)?;
        storage::ensure(&storage)?;

        let store = SymbolStore::open(&storage.sqlite_path(&format!(
            "{}.db",
            storage.project_slug
        )))?;
        let cache = AstCache::open(&storage.sqlite_path("ast_cache.db"))?;
        let vectors = VectorStore::open(&storage.vector_db_path())?;
        let queue = EmbeddingQueue::new(provider, config.embedding.clone());
        let collection = storage.project_slug.clone();

        let bm25 = rehydrate_bm25(&store, config.bm25.clone())?;

        info!(
            root = %project_root.display(),
            collection = %collection,
            bm25_docs = bm25.doc_count(),
            "symbol graph indexer initialized"
        );

        Ok(Self {
            project_root,
            storage,
            store,
            cache: Arc::new(Mutex::new(cache)),
            bm25,
            vectors,
            queue: Some(queue),
            classifier: PartitionClassifier::new(),
            config,
            collection,
        })
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Read access to the relational store (queries only; sweeps own writes).
    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Full sweep over the repository: index changed files, then remove
    /// files that vanished from disk along with all their dependents.
    pub async fn index_repository(&mut self, cancel: &CancelToken) -> Result<SweepStats> {
        let files = discover_files(&self.project_root, &self.config.include, &self.config.exclude)?;
        self.sweep(files, true, cancel).await
    }

    /// Sweep an explicit list of files (absolute or repo-relative). No
    /// deletion pass runs; files missing on disk are reported as errors.
    pub async fn index_files(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<SweepStats> {
        let mut files = Vec::new();
        for path in paths {
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                self.project_root.join(path)
            };
            let Some(rel) = discovery::relative_path(&self.project_root, &abs) else {
                return Err(IndexError::config(format!(
                    "path {} is outside the repository",
                    path.display()
                )));
            };
            files.push((abs, rel));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        self.sweep(files, false, cancel).await
    }

    /// Remove explicit files and all their dependents.
    pub fn remove_files(&mut self, paths: &[PathBuf]) -> Result<()> {
        let rels: Vec<String> = paths
            .iter()
            .map(|p| {
                let abs = if p.is_absolute() {
                    p.clone()
                } else {
                    self.project_root.join(p)
                };
                discovery::relative_path(&self.project_root, &abs)
                    .unwrap_or_else(|| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();

        self.store.delete_files(&rels)?;
        for rel in &rels {
            self.bm25.remove(rel);
            self.vectors.remove(&self.collection, rel)?;
        }
        self.store.save_bm25_globals(
            self.bm25.doc_count() as u64,
            self.bm25.avg_doc_len(),
            &self.bm25.df_table(),
        )?;
        Ok(())
    }

    /// Drop all derived state (force-clean).
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear_all()?;
        self.bm25 = Bm25Index::new(self.config.bm25.clone());
        self.vectors.drop_collection(&self.collection)?;
        info!("cleared symbol graph state");
        Ok(())
    }

    async fn sweep(
        &mut self,
        files: Vec<(PathBuf, String)>,
        delete_missing: bool,
        cancel: &CancelToken,
    ) -> Result<SweepStats> {
        let started = Instant::now();
        let mut stats = SweepStats {
            total_files: files.len(),
            ..Default::default()
        };

        let existing: HashMap<String, FileRecord> = self
            .store
            .all_files()?
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect();
        let existing_hashes: HashMap<String, String> = existing
            .iter()
            .map(|(path, record)| (path.clone(), record.content_hash.clone()))
            .collect();

        // Phase A: read, hash, change-detect and parse on the worker pool.
        let outcomes = run_parse_phase(
            files.clone(),
            existing_hashes,
            self.cache.clone(),
            self.config.max_workers,
            cancel.clone(),
        )
        .await?;

        // Phase B: serial persistence, one atomic replacement per file.
        let mut embed_jobs: Vec<EmbedJob> = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Cancelled => return Err(IndexError::Cancelled),
                FileOutcome::Unchanged { rel } => {
                    debug!(file = %rel, "unchanged");
                    stats.already_indexed += 1;
                }
                FileOutcome::Failed { rel, kind, message } => {
                    warn!(file = %rel, kind, %message, "file skipped");
                    stats.skipped += 1;
                    stats.errors.push(SweepError {
                        path: rel,
                        kind: kind.to_string(),
                        message,
                    });
                }
                FileOutcome::Parsed(parsed) => {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    if parsed.cache_hit {
                        stats.cache_hits += 1;
                    } else {
                        stats.cache_misses += 1;
                    }
                    // A store failure aborts the whole sweep: the failed
                    // file's transaction rolled back, everything committed
                    // before it stays intact.
                    let symbol_count = match self.persist_file(&parsed) {
                        Ok(count) => count,
                        Err(e) => {
                            warn!(file = %parsed.rel, error = %e, "store failure, aborting sweep");
                            return Err(e);
                        }
                    };
                    stats.indexed += 1;
                    stats.total_symbols += symbol_count;
                    info!(
                        file = %parsed.rel,
                        language = %parsed.language,
                        symbols = symbol_count,
                        cached = parsed.cache_hit,
                        "indexed"
                    );
                    embed_jobs.push(self.embed_job_for(&parsed));
                }
            }
        }

        // Deletion pass: anything indexed but no longer discovered goes,
        // dependents included, in one transaction.
        if delete_missing {
            let discovered: HashSet<&String> = files.iter().map(|(_, rel)| rel).collect();
            let removed: Vec<String> = existing
                .keys()
                .filter(|path| !discovered.contains(path))
                .cloned()
                .collect();
            if !removed.is_empty() {
                info!(count = removed.len(), "removing vanished files");
                self.store.delete_files(&removed)?;
                for rel in &removed {
                    self.bm25.remove(rel);
                    self.vectors.remove(&self.collection, rel)?;
                }
            }
        }

        self.store.save_bm25_globals(
            self.bm25.doc_count() as u64,
            self.bm25.avg_doc_len(),
            &self.bm25.df_table(),
        )?;

        // Files indexed earlier but still missing a vector row get another
        // embedding attempt each sweep.
        self.collect_retry_embeddings(&mut embed_jobs)?;
        self.run_embedding_phase(embed_jobs, &mut stats).await?;

        stats.files_with_embeddings = self.vectors.row_count(&self.collection);
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            total = stats.total_files,
            indexed = stats.indexed,
            already_indexed = stats.already_indexed,
            skipped = stats.skipped,
            symbols = stats.total_symbols,
            embeddings = stats.files_with_embeddings,
            errors = stats.errors.len(),
            duration_ms = stats.duration_ms,
            "sweep complete"
        );
        Ok(stats)
    }

    /// Atomically replace one file's graph and refresh its BM25 doc.
    fn persist_file(&mut self, parsed: &ParsedFile) -> Result<usize> {
        let classification = self.classifier.classify(&parsed.rel);
        let record = FileRecord {
            path: parsed.rel.clone(),
            language: parsed.language.clone(),
            size: parsed.size,
            mtime: parsed.mtime,
            content_hash: parsed.hash.clone(),
            last_indexed_at: Utc::now(),
            partition: classification.partition.clone(),
            authority: classification.authority,
        };

        let meta = doc_meta(
            &parsed.rel,
            parsed.result.exports.iter().map(|e| e.name.as_str()),
            parsed
                .result
                .symbols
                .iter()
                .filter(|s| !s.is_exported)
                .map(|s| s.name.as_str()),
            parsed
                .result
                .imports
                .iter()
                .filter_map(|i| i.imported_name.as_deref()),
        );
        self.bm25.index(&parsed.rel, &parsed.content, meta);

        let (doc_len, tokens) = self
            .bm25
            .doc_row(&parsed.rel)
            .map(|(len, tokens)| (len, tokens.clone()))
            .unwrap_or_default();
        // Canonical JSON: sorted keys.
        let ordered: BTreeMap<&String, &u32> = tokens.iter().collect();
        let tokens_json = serde_json::to_vec(&ordered)?;

        if let Err(e) = self.store.replace_file_index(
            &record,
            &parsed.content,
            &parsed.result.symbols,
            &parsed.result.imports,
            &parsed.result.exports,
            doc_len,
            &tokens_json,
        ) {
            // Keep the in-memory index consistent with what is persisted.
            self.bm25.remove(&parsed.rel);
            return Err(e);
        }

        Ok(parsed.result.symbols.len())
    }

    fn embed_job_for(&self, parsed: &ParsedFile) -> EmbedJob {
        let classification = self.classifier.classify(&parsed.rel);
        EmbedJob {
            rel: parsed.rel.clone(),
            text: truncate_chars(&parsed.content, self.config.snippet_max_chars),
            hash: parsed.hash.clone(),
            partition: classification.partition,
            authority: classification.authority,
        }
    }

    /// Add embed jobs for indexed files that still have no vector row.
    fn collect_retry_embeddings(&self, jobs: &mut Vec<EmbedJob>) -> Result<()> {
        let queued: HashSet<String> = jobs.iter().map(|j| j.rel.clone()).collect();
        for record in self.store.all_files()? {
            if queued.contains(&record.path) || self.vectors.has_row(&self.collection, &record.path)
            {
                continue;
            }
            let Some(content) = self.store.file_content(&record.path)? else {
                continue;
            };
            jobs.push(EmbedJob {
                rel: record.path.clone(),
                text: truncate_chars(&content, self.config.snippet_max_chars),
                hash: record.content_hash,
                partition: record.partition,
                authority: record.authority,
            });
        }
        Ok(())
    }

    /// Dispatch embed jobs through the queue and insert the resulting vector
    /// rows. Failures leave files without vectors; the next sweep retries.
    async fn run_embedding_phase(
        &mut self,
        jobs: Vec<EmbedJob>,
        stats: &mut SweepStats,
    ) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let Some(queue) = self.queue.as_ref() else {
            return Ok(());
        };

        debug!(count = jobs.len(), "dispatching embedding jobs");
        let futures = jobs.iter().map(|job| queue.embed(job.text.clone()));
        let results = futures::future::join_all(futures).await;

        let mut rows = Vec::new();
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(Some(vector)) => rows.push(VectorRow {
                    id: job.rel.clone(),
                    content: job.text.clone(),
                    vector,
                    metadata: serde_json::json!({
                        "partition": job.partition,
                        "authority": job.authority,
                        "original_score": 1.0,
                        "content_hash": job.hash,
                    }),
                }),
                Ok(None) => {
                    stats.errors.push(SweepError {
                        path: job.rel.clone(),
                        kind: "embedding".to_string(),
                        message: "service returned null embedding".to_string(),
                    });
                }
                Err(e) => {
                    stats.errors.push(SweepError {
                        path: job.rel.clone(),
                        kind: "embedding".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !rows.is_empty() {
            let inserted = rows.len();
            self.vectors.add(&self.collection, rows)?;
            debug!(inserted, "vector rows written");
        }
        Ok(())
    }

    /// Keyword search: symbol-aware BM25 with partition/authority metadata
    /// attached from the file rows.
    pub fn search_keyword(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let boosts = self.store.boost_config()?;
        let hits = self.bm25.search_symbol_aware(query, k, &boosts);

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let (partition, authority) = self.partition_of(&hit.id, None)?;
            out.push(SearchHit {
                file: hit.id,
                score: hit.score,
                snippet: hit.snippet,
                method: SearchMethod::Keyword,
                metadata: HitMetadata {
                    partition,
                    authority,
                    ..Default::default()
                },
            });
        }
        Ok(out)
    }

    /// Semantic search: embed the query once, nearest-neighbor lookup, then
    /// authority reweighting (original_score is preserved in metadata).
    pub async fn search_semantic(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let candidates = self.semantic_candidates(query, k).await?;

        let mut out = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let (partition, authority) =
                self.partition_of(&candidate.id, Some(&candidate.metadata))?;
            let final_score = candidate.score * authority_factor(authority);
            out.push(SearchHit {
                file: candidate.id,
                score: final_score,
                snippet: first_line(&candidate.content),
                method: SearchMethod::Semantic,
                metadata: HitMetadata {
                    partition,
                    authority,
                    original_score: Some(candidate.score),
                    final_score: Some(final_score),
                    ..Default::default()
                },
            });
        }
        sort_hits(&mut out);
        Ok(out)
    }

    /// Hybrid search: BM25 and semantic top-2k fused by RRF, then authority
    /// reweighting, with per-source provenance in the metadata.
    pub async fn search_hybrid(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let keyword = self.search_keyword(query, k * 2)?;
        let semantic = self.semantic_candidates(query, k * 2).await?;

        let list_a: Vec<(String, f32)> = keyword
            .iter()
            .map(|h| (h.file.clone(), h.score))
            .collect();
        let list_b: Vec<(String, f32)> = semantic
            .iter()
            .map(|c| (c.id.clone(), c.score))
            .collect();

        let config = RrfConfig {
            c: self.config.rrf_c,
            ..Default::default()
        };
        let fused = fuse(&list_a, &list_b, &config);

        let snippets: HashMap<&str, &str> = keyword
            .iter()
            .map(|h| (h.file.as_str(), h.snippet.as_str()))
            .collect();
        let semantic_meta: HashMap<&str, &serde_json::Value> = semantic
            .iter()
            .map(|c| (c.id.as_str(), &c.metadata))
            .collect();
        let query_terms = self.bm25.tokenize(query);

        let mut out = Vec::with_capacity(fused.len());
        for hit in fused {
            let (partition, authority) =
                self.partition_of(&hit.id, semantic_meta.get(hit.id.as_str()).copied())?;
            let final_score = hit.rrf_score * authority_factor(authority);
            let snippet = match snippets.get(hit.id.as_str()) {
                Some(s) => s.to_string(),
                None => self
                    .store
                    .file_content(&hit.id)?
                    .map(|content| snippet_for(&content, &query_terms))
                    .unwrap_or_default(),
            };
            out.push(SearchHit {
                file: hit.id,
                score: final_score,
                snippet,
                method: SearchMethod::Hybrid,
                metadata: HitMetadata {
                    partition,
                    authority,
                    bm25_rank: hit.rank_a,
                    semantic_rank: hit.rank_b,
                    bm25_score: hit.score_a,
                    semantic_score: hit.score_b,
                    final_score: Some(final_score),
                    ..Default::default()
                },
            });
        }
        sort_hits(&mut out);
        out.truncate(k);
        Ok(out)
    }

    /// Embed the query (bounded by the search deadline) and run the raw
    /// vector lookup. A failing embedding service degrades to no semantic
    /// candidates; an exceeded deadline is a Timeout.
    async fn semantic_candidates(&self, query: &str, k: usize) -> Result<Vec<VectorSearchResult>> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(Vec::new());
        };
        let deadline = self.config.search_deadline;

        let vector = match tokio::time::timeout(deadline, queue.embed(query.to_string())).await {
            Err(_) => return Err(IndexError::Timeout(deadline)),
            Ok(Err(e)) => {
                warn!(error = %e, "query embedding failed, semantic path degraded");
                return Ok(Vec::new());
            }
            Ok(Ok(None)) => {
                warn!("embedding service returned null for query, semantic path degraded");
                return Ok(Vec::new());
            }
            Ok(Ok(Some(v))) => v,
        };

        self.vectors.search(&self.collection, &vector, k, 0.0)
    }

    /// Partition and authority for a file: the stored file row wins, the
    /// vector row metadata is the fallback for rows whose file vanished
    /// between embed and query.
    fn partition_of(
        &self,
        path: &str,
        row_metadata: Option<&serde_json::Value>,
    ) -> Result<(String, f32)> {
        if let Some(record) = self.store.get_file(path)? {
            return Ok((record.partition, record.authority));
        }
        if let Some(meta) = row_metadata {
            let partition = meta["partition"].as_str().unwrap_or("project").to_string();
            let authority = meta["authority"].as_f64().unwrap_or(0.5) as f32;
            return Ok((partition, authority));
        }
        Ok(("project".to_string(), 0.5))
    }

    /// Aggregate stats over the persistent index.
    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_files: self.store.file_count()?,
            total_symbols: self.store.total_symbols()?,
            total_imports: self.store.total_imports()?,
            files_with_embeddings: self.vectors.row_count(&self.collection) as u64,
            by_language: self.store.files_by_language()?,
        })
    }

    /// Stored hierarchical outline of one file, from the AST cache.
    pub fn outline(&self, path: &Path) -> Result<Option<Vec<OutlineNode>>> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };
        let cache = self
            .cache
            .lock()
            .map_err(|_| IndexError::store("ast cache mutex poisoned"))?;
        cache.outline(&abs.to_string_lossy())
    }

    pub fn boost_config(&self) -> Result<BoostConfig> {
        self.store.boost_config()
    }

    /// Update the boost configuration; the next keyword search uses it.
    pub fn set_boost_config(&mut self, config: &BoostConfig) -> Result<()> {
        self.store.save_boost_config(config)
    }

    /// Embedding queue counters, if the queue is alive.
    pub fn embedding_metrics(&self) -> Option<QueueMetricsSnapshot> {
        self.queue.as_ref().map(|q| q.metrics())
    }

    /// Flush the embedding queue and close the stores.
    pub async fn close(mut self) -> Result<()> {
        if let Some(queue) = self.queue.take() {
            queue.shutdown().await;
        }
        self.store.checkpoint()?;
        info!("symbol graph indexer closed");
        Ok(())
    }
}

/// Read + hash + change-detect + parse, on a dedicated rayon pool inside
/// spawn_blocking (parsing is CPU-bound). Outcome order follows input order.
async fn run_parse_phase(
    files: Vec<(PathBuf, String)>,
    existing_hashes: HashMap<String, String>,
    cache: Arc<Mutex<AstCache>>,
    max_workers: usize,
    cancel: CancelToken,
) -> Result<Vec<FileOutcome>> {
    tokio::task::spawn_blocking(move || {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .build()
            .map_err(|e| IndexError::config(format!("cannot build parse pool: {e}")))?;

        let outcomes = pool.install(|| {
            files
                .par_iter()
                .map(|(abs, rel)| {
                    if cancel.is_cancelled() {
                        return FileOutcome::Cancelled;
                    }
                    match process_file(abs, rel, existing_hashes.get(rel).map(String::as_str), &cache)
                    {
                        Ok(outcome) => outcome,
                        Err(e) => FileOutcome::Failed {
                            rel: rel.clone(),
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    }
                })
                .collect::<Vec<_>>()
        });
        Ok(outcomes)
    })
    .await
    .map_err(|e| IndexError::store(format!("parse phase panicked: {e}")))?
}

/// One file through read -> hash -> compare -> parse-via-cache.
fn process_file(
    abs: &Path,
    rel: &str,
    existing_hash: Option<&str>,
    cache: &Mutex<AstCache>,
) -> Result<FileOutcome> {
    let metadata = std::fs::metadata(abs)?;
    let mtime: DateTime<Utc> = metadata.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
    let bytes = std::fs::read(abs)?;
    let hash = content_hash(&bytes);

    // The hash is authoritative: a touched mtime with identical bytes is not
    // a change.
    if existing_hash == Some(hash.as_str()) {
        return Ok(FileOutcome::Unchanged {
            rel: rel.to_string(),
        });
    }

    let content = String::from_utf8_lossy(&bytes).into_owned();
    let language = ParserRegistry::language_for_path(abs)
        .unwrap_or("unknown")
        .to_string();
    let abs_key = abs.to_string_lossy().into_owned();

    let cached = {
        let cache = cache
            .lock()
            .map_err(|_| IndexError::store("ast cache mutex poisoned"))?;
        cache.lookup(&abs_key, mtime, &hash)?
    };

    let (result, cache_hit) = match cached {
        Some(result) => (result, true),
        None => {
            let result = ParserRegistry::new().parse(rel, &content, &language)?;
            let cache = cache
                .lock()
                .map_err(|_| IndexError::store("ast cache mutex poisoned"))?;
            cache.store(&CacheEntry {
                file_path: abs_key,
                content_hash: hash.clone(),
                mtime,
                language: language.clone(),
                result: result.clone(),
                file_size: bytes.len() as u64,
            })?;
            (result, false)
        }
    };

    Ok(FileOutcome::Parsed(Box::new(ParsedFile {
        rel: rel.to_string(),
        language,
        content,
        hash,
        mtime,
        size: metadata.len(),
        result,
        cache_hit,
    })))
}

/// Assemble the symbol role metadata the BM25 boosts need.
fn doc_meta<'a>(
    rel: &str,
    exported: impl Iterator<Item = &'a str>,
    defined: impl Iterator<Item = &'a str>,
    imported: impl Iterator<Item = &'a str>,
) -> Bm25DocMeta {
    let stem = Path::new(rel)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(rel);

    Bm25DocMeta {
        file_name_tokens: Bm25DocMeta::name_tokens(stem),
        exported: collect_name_tokens(exported),
        defined: collect_name_tokens(defined),
        imported: collect_name_tokens(imported),
    }
}

fn collect_name_tokens<'a>(names: impl Iterator<Item = &'a str>) -> HashSet<String> {
    let mut set = HashSet::new();
    for name in names {
        set.extend(Bm25DocMeta::name_tokens(name));
    }
    set
}

/// Rebuild the in-memory BM25 index from the persisted doc rows, pulling
/// text and symbol roles back out of the relational tables.
///
/// The role sources mirror `persist_file` exactly: exported names come from
/// the exports table (which also covers `export { x }` clauses that leave
/// the symbol's own flag unset), defined names from the non-exported
/// symbols. Anything else would shift boosts across a reopen.
fn rehydrate_bm25(store: &SymbolStore, params: Bm25Params) -> Result<Bm25Index> {
    let mut index = Bm25Index::new(params);
    for (id, length, tokens_json) in store.load_bm25_docs()? {
        let tokens: HashMap<String, u32> = serde_json::from_slice(&tokens_json)?;
        let text = store.file_content(&id)?.unwrap_or_default();

        let exports = store.exports_for_file(&id)?;
        let (_, defined) = store.symbol_names_for_file(&id)?;
        let imported = store.imported_names_for_file(&id)?;
        let meta = doc_meta(
            &id,
            exports.iter().map(|e| e.name.as_str()),
            defined.iter().map(String::as_str),
            imported.iter().map(String::as_str),
        );

        index.restore(&id, tokens, length, text, meta);
    }
    Ok(index)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn first_line(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .chars()
        .take(160)
        .collect()
}

fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file.cmp(&b.file))
    });
}

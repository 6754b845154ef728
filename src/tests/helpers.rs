// Shared test fixtures: scratch repositories and deterministic embedders.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::embeddings::EmbeddingProvider;
use crate::errors::{IndexError, Result};
use crate::indexer::{IndexerConfig, SymbolGraphIndexer};

pub const EMBED_DIM: usize = 32;

/// Deterministic bag-of-words embedder: tokens hash into a fixed number of
/// buckets, so texts sharing vocabulary are cosine-similar. No randomness,
/// no network.
pub struct HashEmbedder;

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
    {
        vector[(fnv1a(token) % EMBED_DIM as u64) as usize] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash-test"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        Ok(texts.iter().map(|t| Some(hash_embed(t))).collect())
    }
}

/// Provider that always fails, for service-down scenarios.
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn name(&self) -> &str {
        "down"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        Err(IndexError::embedding("service unavailable"))
    }
}

/// A scratch repository with a `var/` dir (forces project-scope storage).
pub fn scratch_repo() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir(dir.path().join("var")).expect("var dir");
    dir
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs");
    }
    fs::write(path, content).expect("write fixture");
}

/// Indexer config tuned for tests: tiny batches and a short flush interval
/// so embedding phases finish in milliseconds.
pub fn test_config() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.max_workers = 2;
    config.embedding.min_batch = 1;
    config.embedding.initial_batch = 8;
    config.embedding.max_batch = 16;
    config.embedding.flush_interval_ms = 10;
    config
}

pub async fn open_indexer(root: &Path) -> SymbolGraphIndexer {
    SymbolGraphIndexer::initialize_with(root, test_config(), Arc::new(HashEmbedder))
        .await
        .expect("indexer init")
}

pub async fn open_indexer_with(
    root: &Path,
    provider: Arc<dyn EmbeddingProvider>,
) -> SymbolGraphIndexer {
    SymbolGraphIndexer::initialize_with(root, test_config(), provider)
        .await
        .expect("indexer init")
}

/// The three-file seed repo used by several scenarios.
pub fn seed_three_file_repo(root: &Path) {
    write_file(
        root,
        "a.ts",
        "export function foo(value: number): number {\n    return value * 2;\n}\n",
    );
    write_file(
        root,
        "b.ts",
        "import { foo } from \"./a\";\n\nconst doubled = foo(21);\nconsole.log(doubled);\n",
    );
    write_file(
        root,
        "c.md",
        "# Notes\n\nProject documentation about doubling numbers.\n",
    );
}

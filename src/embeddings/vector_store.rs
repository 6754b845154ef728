// Vector store
//
// Flat-file vector tables, one JSON file per collection under the storage
// resolver's vector directory. Collections hold one row per file, so exact
// cosine scans stay fast at that scale; rows replace by id and
// the dimension is fixed by the first insert.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cosine_similarity;
use crate::errors::{IndexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRow {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    /// Carries at least partition, authority, original_score, content_hash.
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CollectionData {
    dimension: Option<usize>,
    rows: BTreeMap<String, VectorRow>,
}

#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// max(0, 1 - distance)
    pub score: f32,
    /// Cosine distance, non-negative, smaller is better.
    pub distance: f32,
}

pub struct VectorStore {
    root: PathBuf,
    collections: HashMap<String, CollectionData>,
}

impl VectorStore {
    /// Open the store rooted at `root`, loading any persisted collections.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;

        let mut collections = HashMap::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let data: CollectionData = serde_json::from_str(&fs::read_to_string(&path)?)
                .map_err(|e| {
                    IndexError::store(format!("corrupt vector table {}: {e}", path.display()))
                })?;
            collections.insert(name.to_string(), data);
        }

        debug!(
            root = %root.display(),
            collections = collections.len(),
            "opened vector store"
        );
        Ok(Self {
            root: root.to_path_buf(),
            collections,
        })
    }

    /// Idempotent collection creation.
    pub fn create_collection(&mut self, name: &str) -> Result<()> {
        if !self.collections.contains_key(name) {
            self.collections
                .insert(name.to_string(), CollectionData::default());
            self.persist(name)?;
        }
        Ok(())
    }

    /// Insert rows, replacing any existing row with the same id. The first
    /// row ever inserted fixes the collection's dimension; mixing dimensions
    /// is fatal.
    pub fn add(&mut self, name: &str, rows: Vec<VectorRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.create_collection(name)?;
        let collection = self.collections.get_mut(name).expect("just created");

        for row in rows {
            match collection.dimension {
                None => collection.dimension = Some(row.vector.len()),
                Some(dim) if dim != row.vector.len() => {
                    return Err(IndexError::store(format!(
                        "vector dimension mismatch in '{name}': expected {dim}, got {}",
                        row.vector.len()
                    )));
                }
                Some(_) => {}
            }
            collection.rows.insert(row.id.clone(), row);
        }

        self.persist(name)
    }

    /// Nearest neighbors by cosine distance. Only rows with
    /// `score >= threshold` are returned, sorted descending (id ascending on
    /// ties). A missing collection yields no results.
    pub fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<VectorSearchResult>> {
        let Some(collection) = self.collections.get(name) else {
            return Ok(Vec::new());
        };
        if let Some(dim) = collection.dimension {
            if dim != query.len() {
                return Err(IndexError::store(format!(
                    "query dimension mismatch in '{name}': expected {dim}, got {}",
                    query.len()
                )));
            }
        }

        let mut results: Vec<VectorSearchResult> = collection
            .rows
            .values()
            .map(|row| {
                let similarity = cosine_similarity(query, &row.vector);
                let distance = (1.0 - similarity).max(0.0);
                let score = (1.0 - distance).max(0.0);
                VectorSearchResult {
                    id: row.id.clone(),
                    content: row.content.clone(),
                    metadata: row.metadata.clone(),
                    score,
                    distance,
                }
            })
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Remove one row; false when absent.
    pub fn remove(&mut self, name: &str, id: &str) -> Result<bool> {
        let Some(collection) = self.collections.get_mut(name) else {
            return Ok(false);
        };
        let removed = collection.rows.remove(id).is_some();
        if removed {
            self.persist(name)?;
        }
        Ok(removed)
    }

    /// Drop a collection and its backing file.
    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        if self.collections.remove(name).is_some() {
            let path = self.table_path(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.collections.get(name).map(|c| c.rows.len()).unwrap_or(0)
    }

    pub fn has_row(&self, name: &str, id: &str) -> bool {
        self.collections
            .get(name)
            .map(|c| c.rows.contains_key(id))
            .unwrap_or(false)
    }

    /// Ids present in a collection, sorted.
    pub fn row_ids(&self, name: &str) -> Vec<String> {
        self.collections
            .get(name)
            .map(|c| c.rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn persist(&self, name: &str) -> Result<()> {
        let Some(collection) = self.collections.get(name) else {
            return Ok(());
        };
        let path = self.table_path(name);
        fs::write(&path, serde_json::to_string(collection)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(id: &str, vector: Vec<f32>) -> VectorRow {
        VectorRow {
            id: id.to_string(),
            content: format!("content of {id}"),
            vector,
            metadata: json!({
                "partition": "project",
                "authority": 0.5,
                "original_score": 1.0,
                "content_hash": "h",
            }),
        }
    }

    #[test]
    fn create_collection_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.create_collection("code").unwrap();
        store.create_collection("code").unwrap();
        assert_eq!(store.row_count("code"), 0);
    }

    #[test]
    fn add_replaces_rows_by_id() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.add("code", vec![row("a", vec![1.0, 0.0])]).unwrap();
        store.add("code", vec![row("a", vec![0.0, 1.0])]).unwrap();

        assert_eq!(store.row_count("code"), 1);
        let hits = store.search("code", &[0.0, 1.0], 10, 0.0).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.add("code", vec![row("a", vec![1.0, 0.0])]).unwrap();

        let result = store.add("code", vec![row("b", vec![1.0, 0.0, 0.0])]);
        assert!(matches!(result, Err(IndexError::Store(_))));

        let result = store.search("code", &[1.0], 10, 0.0);
        assert!(matches!(result, Err(IndexError::Store(_))));
    }

    #[test]
    fn search_orders_by_score_and_applies_threshold() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store
            .add(
                "code",
                vec![
                    row("near", vec![1.0, 0.05]),
                    row("far", vec![0.0, 1.0]),
                    row("exact", vec![1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = store.search("code", &[1.0, 0.0], 10, 0.5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "exact");
        assert_eq!(hits[1].id, "near");
        assert!(hits[0].distance < hits[1].distance);
        assert!(hits.iter().all(|h| h.score >= 0.5));
    }

    #[test]
    fn missing_collection_searches_empty() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        assert!(store.search("nope", &[1.0], 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn collections_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = VectorStore::open(dir.path()).unwrap();
            store.add("code", vec![row("a", vec![1.0, 0.0])]).unwrap();
        }
        let store = VectorStore::open(dir.path()).unwrap();
        assert_eq!(store.row_count("code"), 1);
        let hits = store.search("code", &[1.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].metadata["partition"], "project");
    }

    #[test]
    fn drop_collection_removes_table_file() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.add("code", vec![row("a", vec![1.0])]).unwrap();
        assert!(dir.path().join("code.json").exists());

        store.drop_collection("code").unwrap();
        assert!(!dir.path().join("code.json").exists());
        assert_eq!(store.row_count("code"), 0);
    }

    #[test]
    fn remove_row_is_noop_for_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.add("code", vec![row("a", vec![1.0])]).unwrap();

        assert!(!store.remove("code", "missing").unwrap());
        assert!(store.remove("code", "a").unwrap());
        assert_eq!(store.row_count("code"), 0);
    }
}

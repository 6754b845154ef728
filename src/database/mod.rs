// Relational symbol store
//
// SQLite (WAL) persistence for the symbol graph: files, symbols, imports,
// exports, BM25 doc rows and global stats, and the boost configuration.
// One writer at a time; every per-file replacement commits atomically.

mod bm25_state;
mod boosts;
mod files;
mod migrations;
mod schema;
mod symbols;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::errors::{IndexError, Result};

/// Stored row of the `files` table (content is loaded separately).
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
    pub partition: String,
    pub authority: f32,
}

pub struct SymbolStore {
    conn: Connection,
}

impl SymbolStore {
    /// Open (or create) the store and bring the schema up to date. Opening a
    /// database written by a newer schema version is fatal.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            IndexError::store(format!("cannot open symbol store {}: {e}", path.display()))
        })?;

        // WAL before anything else so schema work goes through it as well.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let mut store = Self { conn };
        store.migrate()?;
        debug!(path = %path.display(), "opened symbol store");
        Ok(store)
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let mut store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Truncate every derived table (force-clean sweeps start from nothing).
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in [
            "symbols",
            "imports",
            "exports",
            "bm25_docs",
            "bm25_df",
            "files",
        ] {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.execute("UPDATE bm25_meta SET n = 0, avg_doc_len = 0.0", [])?;
        tx.commit()?;
        Ok(())
    }

    /// TRUNCATE checkpoint so long-lived stores do not grow their WAL
    /// without bound.
    pub fn checkpoint(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{Symbol, SymbolKind};

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: "typescript".into(),
            size: 10,
            mtime: Utc::now(),
            content_hash: "hash".into(),
            last_indexed_at: Utc::now(),
            partition: "project".into(),
            authority: 0.5,
        }
    }

    #[test]
    fn clear_all_empties_every_table() {
        let mut store = SymbolStore::open_in_memory().unwrap();
        let symbols = vec![Symbol::new("a.ts", "foo", SymbolKind::Function, "1:0-1:5".into())];
        store
            .replace_file_index(&record("a.ts"), "export function foo() {}", &symbols, &[], &[], 3, b"{}")
            .unwrap();
        assert_eq!(store.file_count().unwrap(), 1);

        store.clear_all().unwrap();
        assert_eq!(store.file_count().unwrap(), 0);
        assert_eq!(store.total_symbols().unwrap(), 0);
        assert!(store.load_bm25_docs().unwrap().is_empty());
    }
}

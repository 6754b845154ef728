// Schema initialization and table creation

use rusqlite::params;
use tracing::debug;

use super::SymbolStore;
use crate::errors::Result;
use crate::search::BoostConfig;

impl SymbolStore {
    /// Create all tables. Every statement is idempotent.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        debug!("creating symbol store schema");

        self.create_files_table()?;
        self.create_symbols_table()?;
        self.create_imports_table()?;
        self.create_exports_table()?;
        self.create_bm25_tables()?;
        self.create_boost_config_table()?;
        self.seed_default_boost_config()?;

        Ok(())
    }

    fn create_files_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                language TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                last_indexed_at TEXT NOT NULL,
                partition TEXT NOT NULL,
                authority REAL NOT NULL,
                content TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_language ON files(language)",
            [],
        )?;
        Ok(())
    }

    fn create_symbols_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS symbols (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                signature TEXT,
                location TEXT NOT NULL,
                parent_symbol_name TEXT,
                is_exported INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
            [],
        )?;
        Ok(())
    }

    fn create_imports_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS imports (
                file_path TEXT NOT NULL,
                module TEXT NOT NULL,
                imported_name TEXT,
                is_external INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_imports_file ON imports(file_path)",
            [],
        )?;
        Ok(())
    }

    fn create_exports_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS exports (
                file_path TEXT NOT NULL,
                name TEXT NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_exports_file ON exports(file_path)",
            [],
        )?;
        Ok(())
    }

    fn create_bm25_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bm25_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                n INTEGER NOT NULL DEFAULT 0,
                avg_doc_len REAL NOT NULL DEFAULT 0.0
            )",
            [],
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO bm25_meta (id, n, avg_doc_len) VALUES (1, 0, 0.0)",
            [],
        )?;
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bm25_df (
                term TEXT PRIMARY KEY,
                df INTEGER NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bm25_docs (
                id TEXT PRIMARY KEY,
                length INTEGER NOT NULL,
                tokens BLOB NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn create_boost_config_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS boost_config (
                name TEXT PRIMARY KEY,
                file_name_match_boost REAL NOT NULL,
                exported_symbol_boost REAL NOT NULL,
                defined_symbol_boost REAL NOT NULL,
                all_symbol_boost REAL NOT NULL,
                import_only_penalty REAL NOT NULL,
                content_match_weight REAL NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn seed_default_boost_config(&self) -> Result<()> {
        let defaults = BoostConfig::default();
        self.conn.execute(
            "INSERT OR IGNORE INTO boost_config
             (name, file_name_match_boost, exported_symbol_boost, defined_symbol_boost,
              all_symbol_boost, import_only_penalty, content_match_weight)
             VALUES ('default', ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                defaults.file_name_match_boost as f64,
                defaults.exported_symbol_boost as f64,
                defaults.defined_symbol_boost as f64,
                defaults.all_symbol_boost as f64,
                defaults.import_only_penalty as f64,
                defaults.content_match_weight as f64,
            ],
        )?;
        Ok(())
    }
}

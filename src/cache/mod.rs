// AST cache
//
// SQLite-backed cache of parse results, keyed by absolute path. A hit
// requires BOTH the on-disk mtime to be no newer than the cached one and the
// SHA-256 content hash to match; any mismatch is a miss. Parse failures are
// cached too (empty result plus diagnostic) so a broken file does not
// re-parse on every sweep. The cache is advisory: losing it only costs
// re-parse time.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{IndexError, Result};
use crate::extractors::{OutlineNode, ParseResult};

/// Lowercase hex SHA-256 of file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Absolute path of the cached file.
    pub file_path: String,
    pub content_hash: String,
    pub mtime: DateTime<Utc>,
    pub language: String,
    pub result: ParseResult,
    pub file_size: u64,
}

pub struct AstCache {
    conn: Connection,
}

impl AstCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| IndexError::store(format!("cannot open ast cache {}: {e}", path.display())))?;

        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ast_cache (
                file_path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                mtime TEXT NOT NULL,
                language TEXT NOT NULL,
                parse_result TEXT NOT NULL,
                symbols TEXT NOT NULL,
                imports TEXT NOT NULL,
                exports TEXT NOT NULL,
                outline TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                parse_time_ms INTEGER NOT NULL,
                file_size INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Cached ParseResult, iff the mtime and hash checks both pass.
    pub fn lookup(
        &self,
        file_path: &str,
        mtime_on_disk: DateTime<Utc>,
        hash: &str,
    ) -> Result<Option<ParseResult>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT content_hash, mtime, parse_result FROM ast_cache WHERE file_path = ?1",
                params![file_path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((cached_hash, cached_mtime, parse_result)) = row else {
            return Ok(None);
        };

        let cached_mtime = DateTime::parse_from_rfc3339(&cached_mtime)
            .map_err(|e| IndexError::store(format!("corrupt mtime in ast cache: {e}")))?
            .with_timezone(&Utc);

        if mtime_on_disk > cached_mtime || cached_hash != hash {
            debug!(file = file_path, "ast cache miss (stale)");
            return Ok(None);
        }

        let result: ParseResult = serde_json::from_str(&parse_result)?;
        Ok(Some(result))
    }

    /// Idempotent store (INSERT OR REPLACE).
    pub fn store(&self, entry: &CacheEntry) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ast_cache
             (file_path, content_hash, mtime, language, parse_result, symbols,
              imports, exports, outline, cached_at, parse_time_ms, file_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.file_path,
                entry.content_hash,
                entry.mtime.to_rfc3339(),
                entry.language,
                serde_json::to_string(&entry.result)?,
                serde_json::to_string(&entry.result.symbols)?,
                serde_json::to_string(&entry.result.imports)?,
                serde_json::to_string(&entry.result.exports)?,
                serde_json::to_string(&entry.result.outline)?,
                Utc::now().to_rfc3339(),
                entry.result.parse_time_ms,
                entry.file_size,
            ],
        )?;
        Ok(())
    }

    /// Stored outline for a file, regardless of freshness.
    pub fn outline(&self, file_path: &str) -> Result<Option<Vec<OutlineNode>>> {
        let row: Option<String> = self
            .conn
            .query_row(
                "SELECT outline FROM ast_cache WHERE file_path = ?1",
                params![file_path],
                |row| row.get(0),
            )
            .optional()?;

        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn entry_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ast_cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// File row operations and aggregate stats

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{FileRecord, SymbolStore};
use crate::errors::{IndexError, Result};

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| IndexError::store(format!("corrupt timestamp '{text}': {e}")))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(FileRecord, String, String)> {
    Ok((
        FileRecord {
            path: row.get(0)?,
            language: row.get(1)?,
            size: row.get::<_, i64>(2)? as u64,
            mtime: Utc::now(), // placeholder, replaced by caller
            content_hash: row.get(4)?,
            last_indexed_at: Utc::now(), // placeholder, replaced by caller
            partition: row.get(6)?,
            authority: row.get::<_, f64>(7)? as f32,
        },
        row.get::<_, String>(3)?,
        row.get::<_, String>(5)?,
    ))
}

const FILE_COLUMNS: &str =
    "path, language, size, mtime, content_hash, last_indexed_at, partition, authority";

impl SymbolStore {
    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"),
                params![path],
                record_from_row,
            )
            .optional()?;

        match row {
            Some((mut record, mtime, indexed_at)) => {
                record.mtime = parse_timestamp(&mtime)?;
                record.last_indexed_at = parse_timestamp(&indexed_at)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn all_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FILE_COLUMNS} FROM files ORDER BY path"))?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, mtime, indexed_at) = row?;
            record.mtime = parse_timestamp(&mtime)?;
            record.last_indexed_at = parse_timestamp(&indexed_at)?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn file_content(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT content FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn file_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn total_symbols(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn total_imports(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM imports", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn files_by_language(&self) -> Result<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT language, COUNT(*) FROM files GROUP BY language")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut by_language = HashMap::new();
        for row in rows {
            let (language, count) = row?;
            by_language.insert(language, count);
        }
        Ok(by_language)
    }
}

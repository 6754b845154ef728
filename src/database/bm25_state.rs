// BM25 persistence: doc rows ride in the per-file transaction, the global
// df table and meta row are rewritten at end of sweep (they are derived
// state and can always be rebuilt from the doc rows).

use std::collections::HashMap;

use rusqlite::params;

use super::SymbolStore;
use crate::errors::Result;

impl SymbolStore {
    /// All persisted BM25 doc rows as (id, length, tokens-json).
    pub fn load_bm25_docs(&self) -> Result<Vec<(String, u32, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, length, tokens FROM bm25_docs ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? as u32,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Rewrite the global df table and the (N, avg_doc_len) meta row.
    pub fn save_bm25_globals(
        &mut self,
        n: u64,
        avg_doc_len: f32,
        df: &HashMap<String, u32>,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM bm25_df", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO bm25_df (term, df) VALUES (?1, ?2)")?;
            for (term, count) in df {
                stmt.execute(params![term, *count as i64])?;
            }
        }
        tx.execute(
            "UPDATE bm25_meta SET n = ?1, avg_doc_len = ?2 WHERE id = 1",
            params![n as i64, avg_doc_len as f64],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Persisted (N, avg_doc_len).
    pub fn bm25_meta(&self) -> Result<(u64, f32)> {
        let (n, avg): (i64, f64) = self.conn.query_row(
            "SELECT n, avg_doc_len FROM bm25_meta WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((n as u64, avg as f32))
    }
}

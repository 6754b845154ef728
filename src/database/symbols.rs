// Symbol graph persistence: atomic per-file replacement and queries

use rusqlite::params;
use tracing::debug;

use super::{FileRecord, SymbolStore};
use crate::errors::{IndexError, Result};
use crate::extractors::{Export, Import, Symbol, SymbolKind};

impl SymbolStore {
    /// Replace everything the store knows about one file in a single
    /// transaction: the file row, its symbols, imports, exports and its BM25
    /// doc row. A reader never observes a file paired with a previous
    /// version's dependents.
    pub fn replace_file_index(
        &mut self,
        record: &FileRecord,
        content: &str,
        symbols: &[Symbol],
        imports: &[Import],
        exports: &[Export],
        doc_len: u32,
        tokens_json: &[u8],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO files
             (path, language, size, mtime, content_hash, last_indexed_at, partition, authority, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.path,
                record.language,
                record.size as i64,
                record.mtime.to_rfc3339(),
                record.content_hash,
                record.last_indexed_at.to_rfc3339(),
                record.partition,
                record.authority as f64,
                content,
            ],
        )?;

        tx.execute("DELETE FROM symbols WHERE file_path = ?1", params![record.path])?;
        tx.execute("DELETE FROM imports WHERE file_path = ?1", params![record.path])?;
        tx.execute("DELETE FROM exports WHERE file_path = ?1", params![record.path])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbols
                 (id, file_path, name, kind, signature, location, parent_symbol_name, is_exported)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for symbol in symbols {
                stmt.execute(params![
                    symbol.id,
                    symbol.file_path,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.signature,
                    symbol.location,
                    symbol.parent_symbol_name,
                    symbol.is_exported as i64,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO imports (file_path, module, imported_name, is_external)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for import in imports {
                stmt.execute(params![
                    import.file_path,
                    import.module,
                    import.imported_name,
                    import.is_external as i64,
                ])?;
            }
        }

        {
            let mut stmt =
                tx.prepare("INSERT INTO exports (file_path, name) VALUES (?1, ?2)")?;
            for export in exports {
                stmt.execute(params![export.file_path, export.name])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO bm25_docs (id, length, tokens) VALUES (?1, ?2, ?3)",
            params![record.path, doc_len as i64, tokens_json],
        )?;

        tx.commit()?;
        debug!(
            file = %record.path,
            symbols = symbols.len(),
            imports = imports.len(),
            "replaced file index"
        );
        Ok(())
    }

    /// Delete files and all their dependents in one transaction.
    pub fn delete_files(&mut self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for path in paths {
            tx.execute("DELETE FROM symbols WHERE file_path = ?1", params![path])?;
            tx.execute("DELETE FROM imports WHERE file_path = ?1", params![path])?;
            tx.execute("DELETE FROM exports WHERE file_path = ?1", params![path])?;
            tx.execute("DELETE FROM bm25_docs WHERE id = ?1", params![path])?;
            tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        }
        tx.commit()?;
        debug!(count = paths.len(), "deleted files and dependents");
        Ok(())
    }

    pub fn symbols_for_file(&self, path: &str) -> Result<Vec<Symbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path, name, kind, signature, location, parent_symbol_name, is_exported
             FROM symbols WHERE file_path = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![path], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut symbols = Vec::new();
        for row in rows {
            let (id, file_path, name, kind, signature, location, parent, exported) = row?;
            let kind = SymbolKind::parse(&kind)
                .ok_or_else(|| IndexError::store(format!("unknown symbol kind '{kind}'")))?;
            symbols.push(Symbol {
                id,
                file_path,
                name,
                kind,
                signature,
                location,
                parent_symbol_name: parent,
                is_exported: exported != 0,
            });
        }
        Ok(symbols)
    }

    pub fn imports_for_file(&self, path: &str) -> Result<Vec<Import>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, module, imported_name, is_external
             FROM imports WHERE file_path = ?1",
        )?;
        let rows = stmt.query_map(params![path], |row| {
            Ok(Import {
                file_path: row.get(0)?,
                module: row.get(1)?,
                imported_name: row.get(2)?,
                is_external: row.get::<_, i64>(3)? != 0,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    pub fn exports_for_file(&self, path: &str) -> Result<Vec<Export>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, name FROM exports WHERE file_path = ?1")?;
        let rows = stmt.query_map(params![path], |row| {
            Ok(Export {
                file_path: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    /// Names of symbols in a file, split into (exported, defined-only).
    pub fn symbol_names_for_file(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, is_exported FROM symbols WHERE file_path = ?1")?;
        let rows = stmt.query_map(params![path], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
        })?;

        let mut exported = Vec::new();
        let mut defined = Vec::new();
        for row in rows {
            let (name, is_exported) = row?;
            if is_exported {
                exported.push(name);
            } else {
                defined.push(name);
            }
        }
        Ok((exported, defined))
    }

    /// Imported names of a file (for the import-only boost penalty).
    pub fn imported_names_for_file(&self, path: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT imported_name FROM imports
             WHERE file_path = ?1 AND imported_name IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![path], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }
}

// Boost configuration persistence (single row, name = 'default')

use rusqlite::{OptionalExtension, params};

use super::SymbolStore;
use crate::errors::Result;
use crate::search::BoostConfig;

const DEFAULT_NAME: &str = "default";

impl SymbolStore {
    /// The active boost configuration (the schema seeds a default row).
    pub fn boost_config(&self) -> Result<BoostConfig> {
        let row = self
            .conn
            .query_row(
                "SELECT file_name_match_boost, exported_symbol_boost, defined_symbol_boost,
                        all_symbol_boost, import_only_penalty, content_match_weight
                 FROM boost_config WHERE name = ?1",
                params![DEFAULT_NAME],
                |row| {
                    Ok(BoostConfig {
                        file_name_match_boost: row.get::<_, f64>(0)? as f32,
                        exported_symbol_boost: row.get::<_, f64>(1)? as f32,
                        defined_symbol_boost: row.get::<_, f64>(2)? as f32,
                        all_symbol_boost: row.get::<_, f64>(3)? as f32,
                        import_only_penalty: row.get::<_, f64>(4)? as f32,
                        content_match_weight: row.get::<_, f64>(5)? as f32,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_default())
    }

    /// Replace the active boost configuration; takes effect on the next
    /// keyword search.
    pub fn save_boost_config(&self, config: &BoostConfig) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO boost_config
             (name, file_name_match_boost, exported_symbol_boost, defined_symbol_boost,
              all_symbol_boost, import_only_penalty, content_match_weight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                DEFAULT_NAME,
                config.file_name_match_boost as f64,
                config.exported_symbol_boost as f64,
                config.defined_symbol_boost as f64,
                config.all_symbol_boost as f64,
                config.import_only_penalty as f64,
                config.content_match_weight as f64,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_serves_seeded_defaults() {
        let store = SymbolStore::open_in_memory().unwrap();
        assert_eq!(store.boost_config().unwrap(), BoostConfig::default());
    }

    #[test]
    fn updates_persist_and_replace() {
        let store = SymbolStore::open_in_memory().unwrap();
        let custom = BoostConfig {
            file_name_match_boost: 0.9,
            ..BoostConfig::default()
        };
        store.save_boost_config(&custom).unwrap();

        let loaded = store.boost_config().unwrap();
        assert!((loaded.file_name_match_boost - 0.9).abs() < 1e-6);
        assert_eq!(loaded.exported_symbol_boost, custom.exported_symbol_boost);
    }
}

// Schema versioning
//
// `PRAGMA user_version` tracks the schema generation. Migrations are
// idempotent: a fresh database and a current one both pass through
// `initialize_schema` unchanged. A database written by a newer build refuses
// to open rather than guessing.

use tracing::{debug, info};

use super::SymbolStore;
use crate::errors::{IndexError, Result};

const SCHEMA_VERSION: i64 = 1;

impl SymbolStore {
    pub(super) fn migrate(&mut self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > SCHEMA_VERSION {
            return Err(IndexError::store(format!(
                "symbol store schema version {version} is newer than supported {SCHEMA_VERSION}"
            )));
        }

        if version == 0 {
            info!("initializing symbol store schema v{SCHEMA_VERSION}");
        } else {
            debug!("symbol store schema v{version} is current");
        }

        // Idempotent: CREATE IF NOT EXISTS throughout.
        self.initialize_schema()?;

        if version < SCHEMA_VERSION {
            self.conn
                .execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])?;
        }
        Ok(())
    }
}

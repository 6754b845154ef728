// Storage path resolution
//
// Computes the storage root for a project deterministically: the `project`
// scope lives inside the repository under `var/storage`, the `system` scope
// is shared per host under the user home. The same (project_root,
// prefer_local) pair always resolves to the same paths within a process and
// across restarts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{IndexError, Result};

/// Env flag that forces the project scope even when `<repo>/var` is absent.
pub const PREFER_PROJECT_STORAGE_ENV: &str = "PREFER_PROJECT_STORAGE";

/// Directory name of the shared per-host scope, under the user home.
const SYSTEM_DIR_NAME: &str = ".symdex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScope {
    /// Shared per-host storage under the user home.
    System,
    /// Per-repository storage under `<repo>/var/storage`.
    Project,
}

/// Resolved storage configuration for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub scope: StorageScope,
    pub base_dir: PathBuf,
    /// Stable per-project slug, used to keep projects apart in the shared
    /// system scope (database and collection names derive from it).
    pub project_slug: String,
}

impl StorageConfig {
    /// Path of a SQLite database file under `sqlite/`.
    pub fn sqlite_path(&self, name: &str) -> PathBuf {
        self.base_dir.join("sqlite").join(name)
    }

    /// Directory holding the vector tables.
    pub fn vector_db_path(&self) -> PathBuf {
        self.base_dir.join("lancedb")
    }

    /// Path of a log file or subdirectory under `logs/`.
    pub fn logs_path(&self, subpath: &str) -> PathBuf {
        self.base_dir.join("logs").join(subpath)
    }
}

/// Choose the storage scope and base directory for `project_root`.
///
/// The project scope wins when `<repo>/var` exists, when
/// `PREFER_PROJECT_STORAGE` is truthy, or when the caller passes
/// `prefer_local = Some(true)`. Otherwise the shared system scope is used.
pub fn resolve(project_root: &Path, prefer_local: Option<bool>) -> Result<StorageConfig> {
    let root = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());

    let env_flag = std::env::var(PREFER_PROJECT_STORAGE_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false);

    let use_project = prefer_local.unwrap_or(false) || env_flag || root.join("var").is_dir();

    let config = if use_project {
        StorageConfig {
            scope: StorageScope::Project,
            base_dir: root.join("var").join("storage"),
            project_slug: project_slug(&root),
        }
    } else {
        let home = dirs::home_dir()
            .ok_or_else(|| IndexError::config("cannot resolve user home directory"))?;
        StorageConfig {
            scope: StorageScope::System,
            base_dir: home.join(SYSTEM_DIR_NAME),
            project_slug: project_slug(&root),
        }
    };

    debug!(
        scope = ?config.scope,
        base = %config.base_dir.display(),
        slug = %config.project_slug,
        "resolved storage"
    );
    Ok(config)
}

/// Create the `sqlite/`, `lancedb/` and `logs/` subtrees. Failure is fatal.
pub fn ensure(config: &StorageConfig) -> Result<()> {
    for dir in [
        config.base_dir.join("sqlite"),
        config.base_dir.join("lancedb"),
        config.base_dir.join("logs"),
    ] {
        fs::create_dir_all(&dir).map_err(|e| {
            IndexError::config(format!("cannot create storage dir {}: {e}", dir.display()))
        })?;
    }
    Ok(())
}

/// Stable slug for a project root: `<dirname>-<8 hex of sha256(path)>`.
///
/// Keeps projects apart in the shared system scope while staying readable in
/// file listings.
fn project_slug(root: &Path) -> String {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>();

    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{name}-{}", &digest[..8])
}

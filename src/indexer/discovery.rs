// File discovery
//
// Enumerates indexable files: include globs minus exclude globs, matched
// against the repo-relative path with forward slashes. Results are sorted so
// sweeps are deterministic.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::errors::Result;

pub fn default_include() -> Vec<String> {
    ["*.ts", "*.tsx", "*.js", "*.jsx", "*.py", "*.md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_exclude() -> Vec<String> {
    [
        "node_modules/**",
        "dist/**",
        "build/**",
        ".git/**",
        "**/*.test.*",
        "**/*.spec.*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Compile a glob list; an invalid pattern is a ConfigError.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Repo-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Walk `root` and return (absolute, repo-relative) pairs of files matching
/// the include globs and none of the exclude globs, sorted by relative path.
pub fn discover_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<(PathBuf, String)>> {
    let include_set = build_globset(include)?;
    let exclude_set = build_globset(exclude)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            // Unreadable subtrees are skipped, not fatal for the sweep.
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_path(root, entry.path()) else {
            continue;
        };
        if include_set.is_match(&rel) && !exclude_set.is_match(&rel) {
            files.push((entry.path().to_path_buf(), rel));
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

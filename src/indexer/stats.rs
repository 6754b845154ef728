// Sweep statistics and the aggregate index stats surface

use std::collections::HashMap;

use serde::Serialize;

/// One captured per-file failure (parse, read or embedding); the sweep
/// continues past these. Store failures are not captured here, they abort
/// the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub path: String,
    pub kind: String,
    pub message: String,
}

/// Result of one `index_repository` / `index_files` sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub total_files: usize,
    /// Files parsed and persisted this sweep.
    pub indexed: usize,
    /// Files whose stored hash already matched the bytes on disk.
    pub already_indexed: usize,
    /// Files skipped because they could not be read or stored.
    pub skipped: usize,
    pub files_with_embeddings: usize,
    pub total_symbols: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub errors: Vec<SweepError>,
    pub duration_ms: u64,
}

impl SweepStats {
    /// Hit rate over parse work this sweep, in [0, 1]. A sweep with no parse
    /// work counts as all hits (nothing had to be parsed).
    pub fn cache_hit_rate(&self) -> f32 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            1.0
        } else {
            self.cache_hits as f32 / lookups as f32
        }
    }
}

/// Aggregate view of the persistent index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_files: u64,
    pub total_symbols: u64,
    pub total_imports: u64,
    pub files_with_embeddings: u64,
    pub by_language: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_with_no_lookups_is_full() {
        assert_eq!(SweepStats::default().cache_hit_rate(), 1.0);
    }

    #[test]
    fn hit_rate_is_a_ratio() {
        let stats = SweepStats {
            cache_hits: 19,
            cache_misses: 1,
            ..Default::default()
        };
        assert!((stats.cache_hit_rate() - 0.95).abs() < 1e-6);
    }
}

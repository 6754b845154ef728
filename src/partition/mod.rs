// Partition classification
//
// Maps a repo-relative path to a partition label and an authority score in
// [0, 1]. Pure and deterministic: an ordered rule list, first match wins,
// with a `project` default. Authority feeds the search-time reweighting.

use glob::Pattern;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub partition: String,
    pub authority: f32,
}

#[derive(Debug, Clone)]
pub struct PartitionRule {
    pub pattern: Pattern,
    pub partition: &'static str,
    pub authority: f32,
}

pub struct PartitionClassifier {
    rules: Vec<PartitionRule>,
}

impl Default for PartitionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionClassifier {
    /// Seeded static rule set, ordered most-specific first.
    pub fn new() -> Self {
        let seeds: &[(&str, &'static str, f32)] = &[
            ("dom0/**", "dom0", 1.0),
            ("**/node_modules/**", "third_party", 0.2),
            ("**/vendor/**", "third_party", 0.2),
            ("**/third_party/**", "third_party", 0.3),
            ("**/dist/**", "generated", 0.1),
            ("**/build/**", "generated", 0.1),
            ("**/__generated__/**", "generated", 0.1),
            ("**/*.gen.*", "generated", 0.1),
        ];

        let rules = seeds
            .iter()
            .map(|(pat, partition, authority)| PartitionRule {
                pattern: Pattern::new(pat).expect("static partition pattern"),
                partition,
                authority: *authority,
            })
            .collect();

        Self { rules }
    }

    /// Classify a repo-relative path (forward slashes).
    pub fn classify(&self, path: &str) -> Classification {
        let path = path.trim_start_matches("./");

        // Language partitions are keyed off the leading directory.
        if let Some(first) = path.split('/').next() {
            if first.starts_with("lang_") && path.contains('/') {
                return Classification {
                    partition: first.to_string(),
                    authority: 0.8,
                };
            }
        }

        for rule in &self.rules {
            if rule.pattern.matches(path) {
                return Classification {
                    partition: rule.partition.to_string(),
                    authority: rule.authority,
                };
            }
        }

        Classification {
            partition: "project".to_string(),
            authority: 0.5,
        }
    }
}

// Reciprocal Rank Fusion
//
// Merges two ranked lists by rank alone: rrf(id) = Σ w_s / (c + rank_s(id))
// with 1-based ranks. Scale-invariant by construction, and a document ranked
// by both sources always beats one seen by a single source at comparable
// ranks. Provenance (per-source rank and score) rides along for callers that
// surface it.

use serde::Serialize;

pub const DEFAULT_RRF_C: f32 = 60.0;

#[derive(Debug, Clone)]
pub struct RrfConfig {
    pub c: f32,
    pub weight_a: f32,
    pub weight_b: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_RRF_C,
            weight_a: 1.0,
            weight_b: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FusedHit {
    pub id: String,
    pub rrf_score: f32,
    /// 1-based rank in source A, when present there.
    pub rank_a: Option<usize>,
    /// 1-based rank in source B, when present there.
    pub rank_b: Option<usize>,
    pub score_a: Option<f32>,
    pub score_b: Option<f32>,
}

/// Fuse two ranked `(id, score)` lists, best first. Input order defines the
/// ranks; the input scores are carried through untouched.
pub fn fuse(a: &[(String, f32)], b: &[(String, f32)], config: &RrfConfig) -> Vec<FusedHit> {
    let mut fused: Vec<FusedHit> = Vec::new();
    let mut index_of = std::collections::HashMap::new();

    for (rank0, (id, score)) in a.iter().enumerate() {
        index_of.insert(id.as_str(), fused.len());
        fused.push(FusedHit {
            id: id.clone(),
            rrf_score: config.weight_a / (config.c + (rank0 + 1) as f32),
            rank_a: Some(rank0 + 1),
            rank_b: None,
            score_a: Some(*score),
            score_b: None,
        });
    }

    for (rank0, (id, score)) in b.iter().enumerate() {
        let contribution = config.weight_b / (config.c + (rank0 + 1) as f32);
        match index_of.get(id.as_str()) {
            Some(&i) => {
                fused[i].rrf_score += contribution;
                fused[i].rank_b = Some(rank0 + 1);
                fused[i].score_b = Some(*score);
            }
            None => fused.push(FusedHit {
                id: id.clone(),
                rrf_score: contribution,
                rank_a: None,
                rank_b: Some(rank0 + 1),
                score_a: None,
                score_b: Some(*score),
            }),
        }
    }

    fused.sort_by(|x, y| {
        y.rrf_score
            .partial_cmp(&x.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.id.cmp(&y.id))
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ids: &[&str]) -> Vec<(String, f32)> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), 1.0 / (i + 1) as f32))
            .collect()
    }

    #[test]
    fn fuses_the_documented_example() {
        // BM25 = [f1, f2, f3], SEM = [f2, f1, f4], c = 60:
        // f1 = f2 = 1/61 + 1/62, f3 = f4 = 1/63.
        let a = ranked(&["f1", "f2", "f3"]);
        let b = ranked(&["f2", "f1", "f4"]);

        let fused = fuse(&a, &b, &RrfConfig::default());
        let expected_top = 1.0 / 61.0 + 1.0 / 62.0;
        let expected_tail = 1.0 / 63.0;

        assert_eq!(fused[0].id, "f1");
        assert_eq!(fused[1].id, "f2");
        assert!((fused[0].rrf_score - expected_top).abs() < 1e-4);
        assert!((fused[1].rrf_score - expected_top).abs() < 1e-4);
        assert!((fused[2].rrf_score - expected_tail).abs() < 1e-4);
        assert!((fused[3].rrf_score - expected_tail).abs() < 1e-4);
        // Consensus pair outranks both single-source docs.
        assert!(fused[1].rrf_score > fused[2].rrf_score);
    }

    #[test]
    fn scale_invariant_in_input_scores() {
        let a = ranked(&["x", "y", "z"]);
        let mut scaled = a.clone();
        for (_, score) in &mut scaled {
            *score *= 1000.0;
        }
        let b = ranked(&["y", "w"]);

        let plain: Vec<String> = fuse(&a, &b, &RrfConfig::default())
            .into_iter()
            .map(|h| h.id)
            .collect();
        let boosted: Vec<String> = fuse(&scaled, &b, &RrfConfig::default())
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(plain, boosted);
    }

    #[test]
    fn consensus_beats_single_source_first_place() {
        let a = ranked(&["both", "only_a"]);
        let b = ranked(&["both", "only_b"]);

        let fused = fuse(&a, &b, &RrfConfig::default());
        assert_eq!(fused[0].id, "both");
        // Rank-1-in-both strictly beats rank 1 in a single source.
        assert!(fused[0].rrf_score > fused[1].rrf_score);
    }

    #[test]
    fn provenance_is_preserved() {
        let a = ranked(&["f1", "f2"]);
        let b = ranked(&["f2"]);

        let fused = fuse(&a, &b, &RrfConfig::default());
        let f2 = fused.iter().find(|h| h.id == "f2").unwrap();
        assert_eq!(f2.rank_a, Some(2));
        assert_eq!(f2.rank_b, Some(1));
        assert!(f2.score_a.is_some() && f2.score_b.is_some());

        let f1 = fused.iter().find(|h| h.id == "f1").unwrap();
        assert_eq!(f1.rank_b, None);
        assert_eq!(f1.score_b, None);
    }

    #[test]
    fn per_source_weights_shift_ranking() {
        let a = ranked(&["a_first"]);
        let b = ranked(&["b_first"]);

        let config = RrfConfig {
            weight_a: 0.1,
            weight_b: 1.0,
            ..Default::default()
        };
        let fused = fuse(&a, &b, &config);
        assert_eq!(fused[0].id, "b_first");
    }

    #[test]
    fn empty_inputs_fuse_to_empty() {
        let fused = fuse(&[], &[], &RrfConfig::default());
        assert!(fused.is_empty());
    }
}

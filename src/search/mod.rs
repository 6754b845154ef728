// Search primitives: BM25 keyword retrieval and rank fusion.
//
// The semantic path lives in `embeddings`; the orchestration of both paths
// (plus authority reweighting) is the indexer's job.

pub mod bm25;
pub mod fusion;

pub use bm25::{Bm25DocMeta, Bm25Hit, Bm25Index, Bm25Params, BoostConfig};
pub use fusion::{DEFAULT_RRF_C, FusedHit, RrfConfig, fuse};

//! Search primitives: scored results, keyword token-overlap scoring, and
//! Reciprocal Rank Fusion.

/// Keyword search: tokenization and token-overlap scoring.
pub mod keyword;
/// Reciprocal Rank Fusion over ranked result lists.
pub mod rrf;

pub use keyword::{keyword_search, tokenize};
pub use rrf::rrf_fuse;

use serde::{Deserialize, Serialize};

/// One scored search hit. Every search operation produces these ordered
/// descending by score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub key: String,
    pub score: f32,
}

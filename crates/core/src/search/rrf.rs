//! Reciprocal Rank Fusion.
//!
//! Combines ranked lists without needing comparable raw scores: an entry at
//! 1-based rank `r` contributes `1 / (K + r)` to its key's fused score. A key
//! present in only one list is scored from that list alone.

use crate::search::SearchResult;
use std::collections::HashMap;

/// Fuse `rankings` in order. Output is sorted descending by fused score; the
/// sort is stable over discovery order (first appearance while walking the
/// lists), which makes ties deterministic.
pub fn rrf_fuse(rankings: &[Vec<SearchResult>], k_const: f32) -> Vec<SearchResult> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut discovery: Vec<String> = Vec::new();

    for ranking in rankings {
        for (i, result) in ranking.iter().enumerate() {
            let rank = (i + 1) as f32;
            let entry = scores.entry(result.key.clone()).or_insert_with(|| {
                discovery.push(result.key.clone());
                0.0
            });
            *entry += 1.0 / (k_const + rank);
        }
    }

    let mut fused: Vec<SearchResult> = discovery
        .into_iter()
        .map(|key| {
            let score = scores[&key];
            SearchResult { key, score }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

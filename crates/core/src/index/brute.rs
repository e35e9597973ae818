//! Exact brute-force index: full-precision vectors, O(n) cosine scan.
//!
//! Serves as the correctness baseline the IVF variant is measured against.

use crate::index::{bytes_to_vector, similarity::cosine_similarity};
use crate::search::SearchResult;
use std::collections::HashMap;

/// Ordered collection of (key, vector) pairs.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    vectors: Vec<(String, Vec<f32>)>,
}

impl BruteForceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, vector: Vec<f32>) {
        self.vectors.push((key.to_string(), vector));
    }

    pub fn remove(&mut self, key: &str) {
        self.vectors.retain(|(k, _)| k != key);
    }

    /// Score every entry against `query`, sort descending, truncate to `k`.
    /// The sort is stable, so equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .vectors
            .iter()
            .map(|(key, v)| SearchResult {
                key: key.clone(),
                score: cosine_similarity(query, v),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        results
    }

    pub fn rebuild(&mut self, data: &HashMap<String, Vec<u8>>) {
        self.vectors.clear();
        for (key, bytes) in data {
            self.add(key, bytes_to_vector(bytes));
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

//! Inverted-file (IVF) index: fixed centroids, quantized buckets, probed
//! search.
//!
//! Vectors are bucketed under their most-similar centroid at insert time and
//! stored quantized. A query ranks all centroids, visits only the top
//! `probes` buckets, and rescores their entries exactly after dequantization.
//! Larger probe counts approach brute-force recall at higher cost; smaller
//! ones are faster but can miss neighbors whose home bucket was not probed.

use crate::error::{Result, StoreError};
use crate::index::bytes_to_vector;
use crate::index::quantization::QuantizedVector;
use crate::index::similarity::cosine_similarity;
use crate::search::SearchResult;
use rand::Rng;
use std::collections::HashMap;

/// Approximate index over a fixed, immutable centroid set.
#[derive(Debug)]
pub struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    buckets: Vec<Vec<QuantizedVector>>,
    probes: usize,
    dim: usize,
}

impl IvfIndex {
    /// Build an index over `centroids`, probing `probes` buckets per query
    /// (clamped to `[1, centroid count]`).
    ///
    /// Fails with `InvalidConfiguration` when the centroid set is empty, has
    /// zero dimension, or mixes dimensions. These are setup mistakes and
    /// should stop startup.
    pub fn new(centroids: Vec<Vec<f32>>, probes: usize) -> Result<Self> {
        if centroids.is_empty() {
            return Err(StoreError::InvalidConfiguration(
                "ivf index requires at least one centroid".to_string(),
            ));
        }
        let dim = centroids[0].len();
        if dim == 0 {
            return Err(StoreError::InvalidConfiguration(
                "centroid dimension cannot be zero".to_string(),
            ));
        }
        if let Some(bad) = centroids.iter().find(|c| c.len() != dim) {
            return Err(StoreError::InvalidConfiguration(format!(
                "centroid dimension mismatch: expected {dim}, found {}",
                bad.len()
            )));
        }

        let probes = probes.clamp(1, centroids.len());
        let buckets = centroids.iter().map(|_| Vec::new()).collect();

        Ok(Self {
            centroids,
            buckets,
            probes,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn probes(&self) -> usize {
        self.probes
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                got: len,
            });
        }
        Ok(())
    }

    /// Assign `vector` to its most-similar centroid and append the quantized
    /// form to that bucket. Ties go to the first centroid encountered.
    pub fn add(&mut self, key: &str, vector: Vec<f32>) -> Result<()> {
        self.check_dim(vector.len())?;

        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (i, centroid) in self.centroids.iter().enumerate() {
            let score = cosine_similarity(&vector, centroid);
            if score > best_score {
                best_score = score;
                best = i;
            }
        }

        self.buckets[best].push(QuantizedVector::quantize(key, &vector));
        Ok(())
    }

    /// Scan every bucket for `key`. No reverse index is kept, so removal is
    /// O(total entries) — acceptable at expected bucket sizes.
    pub fn remove(&mut self, key: &str) {
        for bucket in &mut self.buckets {
            bucket.retain(|qv| qv.key != key);
        }
    }

    /// Rank centroids against `query`, probe the top buckets, dequantize and
    /// rescore exactly, then merge descending and truncate to `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_dim(query.len())?;

        let mut centroid_order: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query, c)))
            .collect();
        centroid_order.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut results = Vec::new();
        for &(bucket_idx, _) in centroid_order.iter().take(self.probes) {
            for qv in &self.buckets[bucket_idx] {
                let vector = qv.dequantize();
                results.push(SearchResult {
                    key: qv.key.clone(),
                    score: cosine_similarity(&vector, query),
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// Clear all buckets and reinsert every stored value. Values whose byte
    /// length does not match the index dimension are skipped with a warning;
    /// the store pre-validates writes, so this only fires when an existing
    /// data directory is reopened under a different dimension.
    pub fn rebuild(&mut self, data: &HashMap<String, Vec<u8>>) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (key, bytes) in data {
            if let Err(e) = self.add(key, bytes_to_vector(bytes)) {
                tracing::warn!("skipping '{key}' during index rebuild: {e}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform random centroids for bootstrap, in `[0, 1)` per component.
pub fn random_centroids(count: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    if count == 0 {
        return Err(StoreError::InvalidConfiguration(
            "centroid count must be greater than zero".to_string(),
        ));
    }
    if dim == 0 {
        return Err(StoreError::InvalidConfiguration(
            "centroid dimension must be greater than zero".to_string(),
        ));
    }

    let mut rng = rand::thread_rng();
    Ok((0..count)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect())
}

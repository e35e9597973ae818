//! Vector indexes over stored values.
//!
//! Two interchangeable variants behind one [`VectorIndex`] enum, selected at
//! construction:
//! - [`BruteForceIndex`]: exact cosine scan, the correctness baseline.
//! - [`IvfIndex`]: approximate inverted-file index with fixed centroids and
//!   scalar-quantized bucket entries — a recall/speed trade-off tuned by the
//!   probe count.
//!
//! Stored values become searchable vectors through a fixed mapping: each byte
//! widens to one `f32` component, so no separate embedding step is needed.

/// Exact brute-force index.
pub mod brute;
/// Approximate inverted-file index.
pub mod ivf;
/// Scalar quantization: f32 → i8 codes plus a per-vector scale.
pub mod quantization;
/// Cosine similarity primitives.
pub mod similarity;

pub use brute::BruteForceIndex;
pub use ivf::{random_centroids, IvfIndex};
pub use quantization::QuantizedVector;

use crate::error::Result;
use crate::search::SearchResult;
use std::collections::HashMap;

/// Capability surface shared by both index variants.
///
/// Modeled as a tagged union rather than a trait object so the variant is
/// fixed at construction and dispatch stays static.
#[derive(Debug)]
pub enum VectorIndex {
    BruteForce(BruteForceIndex),
    Ivf(IvfIndex),
}

impl VectorIndex {
    /// Insert a vector for `key`. Callers replacing an existing key must
    /// [`remove`](Self::remove) first; the store does this under its lock so
    /// no key ever holds two vectors.
    pub fn add(&mut self, key: &str, vector: Vec<f32>) -> Result<()> {
        match self {
            VectorIndex::BruteForce(idx) => {
                idx.add(key, vector);
                Ok(())
            }
            VectorIndex::Ivf(idx) => idx.add(key, vector),
        }
    }

    /// Delete all vectors for `key`. A no-op when the key is absent.
    pub fn remove(&mut self, key: &str) {
        match self {
            VectorIndex::BruteForce(idx) => idx.remove(key),
            VectorIndex::Ivf(idx) => idx.remove(key),
        }
    }

    /// Up to `k` results ordered by descending similarity.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        match self {
            VectorIndex::BruteForce(idx) => Ok(idx.search(query, k)),
            VectorIndex::Ivf(idx) => idx.search(query, k),
        }
    }

    /// Clear all internal state and reinsert every stored value, deriving
    /// vectors with [`bytes_to_vector`].
    pub fn rebuild(&mut self, data: &HashMap<String, Vec<u8>>) {
        match self {
            VectorIndex::BruteForce(idx) => idx.rebuild(data),
            VectorIndex::Ivf(idx) => idx.rebuild(data),
        }
    }

    /// Fixed dimension enforced by the index, if any. The store uses this to
    /// pre-validate writes before they reach the WAL.
    pub fn dim(&self) -> Option<usize> {
        match self {
            VectorIndex::BruteForce(_) => None,
            VectorIndex::Ivf(idx) => Some(idx.dim()),
        }
    }
}

/// Widen raw value bytes into a float vector, one dimension per byte.
pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| b as f32).collect()
}

//! # fusekv-core
//!
//! Embeddable key-value engine with write-ahead-log durability, periodic
//! snapshot compaction, and similarity search over stored values: exact
//! brute-force and approximate inverted-file (IVF) vector search, plus
//! keyword search fused via Reciprocal Rank Fusion.
//!
//! This is the synchronous core library with zero async dependencies —
//! suitable for embedding directly or wrapping in a server process
//! (see `fusekv-server`).

/// Tuning constants: snapshot interval, index defaults, fusion parameters.
pub mod config;
/// Error types shared across the engine.
pub mod error;
/// Vector indexes: brute-force baseline and quantized inverted-file variant.
pub mod index;
/// Operation counters exposed as a point-in-time snapshot.
pub mod metrics;
/// Keyword scoring and rank fusion utilities.
pub mod search;
/// Storage layer: store, write-ahead log, and snapshot persistence.
pub mod storage;

pub use error::StoreError;
pub use index::VectorIndex;
pub use metrics::Metrics;
pub use search::SearchResult;
pub use storage::Store;

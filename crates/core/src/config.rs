//! Tuning constants for fusekv.
//!
//! These are compile-time defaults; runtime configuration is handled by the
//! server crate's JSON/env config and CLI arguments.

/// Reciprocal Rank Fusion constant `K` in `1 / (K + rank)`.
///
/// Standard value is 60 (from the original RRF paper).
pub const RRF_K: f32 = 60.0;

/// Multiplier applied to `k` when gathering per-list candidates for hybrid
/// search, so fusion sees a generous pool before truncation.
pub const HYBRID_POOL_FACTOR: usize = 2;

/// Number of mutations between automatic snapshot + WAL reset cycles.
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 1000;

/// Default number of IVF centroids.
pub const DEFAULT_CENTROID_COUNT: usize = 64;

/// Default vector dimension: one component per stored value byte.
pub const DEFAULT_DIMENSION: usize = 384;

/// Default number of IVF buckets probed per query.
pub const DEFAULT_PROBE_COUNT: usize = 3;

/// Upper bound on a single WAL field length. Replay treats anything larger
/// as a corrupt tail rather than attempting the allocation.
pub const MAX_WAL_FIELD_BYTES: u32 = 64 * 1024 * 1024;

/// Interval between leader heartbeat broadcasts, in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 500;

/// A follower re-runs election when no heartbeat arrives within this window.
pub const LEADER_TIMEOUT_MS: u64 = 2000;

/// Client-side timeout for a single replication or heartbeat RPC.
pub const RPC_TIMEOUT_MS: u64 = 1000;

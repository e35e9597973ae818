//! Storage layer: the store, its write-ahead log, and snapshot persistence.
//!
//! Every mutation is appended to the WAL before touching memory. Snapshots
//! bound log growth: after a successful snapshot the WAL is truncated, and
//! startup replays `snapshot + WAL tail` back into an identical map + index.

/// Snapshot save/load with atomic publish and CRC32 footer.
pub mod snapshot;
/// The concurrent key-value store orchestrating WAL, map, and index.
pub mod store;
/// Append-only write-ahead log with torn-tail-tolerant replay.
pub mod wal;

pub use store::Store;
pub use wal::{LogEntry, ReplayStats, WalApplier, WriteAheadLog};

//! The concurrent key-value store.
//!
//! One reader/writer lock covers the map, the vector index, and the
//! operation counter: every Set/Delete mutates map and index together inside
//! the same critical section, so no observer ever sees one updated without
//! the other. Durability ordering is WAL append → in-memory apply → periodic
//! snapshot + WAL reset.

use crate::config::{HYBRID_POOL_FACTOR, RRF_K};
use crate::error::{Result, StoreError};
use crate::index::{bytes_to_vector, VectorIndex};
use crate::metrics::Metrics;
use crate::search::{keyword_search, rrf_fuse, SearchResult};
use crate::storage::snapshot;
use crate::storage::wal::{ReplayStats, WalApplier, WriteAheadLog};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// WAL file name inside the data directory.
pub const WAL_FILE: &str = "fusekv.wal";

/// Map, index, and operation counter — everything guarded by the store lock.
struct StoreInner {
    data: HashMap<String, Vec<u8>>,
    index: VectorIndex,
    op_count: u64,
}

impl StoreInner {
    /// In-memory apply path, shared by writes, WAL replay, and inbound
    /// replication. Remove-then-add keeps the index at exactly one vector
    /// per key.
    fn apply_set(&mut self, key: String, value: Vec<u8>) {
        self.index.remove(&key);
        if let Err(e) = self.index.add(&key, bytes_to_vector(&value)) {
            // Pre-validated on the write path; only reachable when replaying
            // a directory written under a different index dimension.
            tracing::warn!("index add for '{key}' failed: {e}");
        }
        self.data.insert(key, value);
    }

    fn apply_delete(&mut self, key: &str) {
        self.data.remove(key);
        self.index.remove(key);
    }
}

impl WalApplier for StoreInner {
    fn apply_set(&mut self, key: String, value: Vec<u8>) {
        StoreInner::apply_set(self, key, value);
    }
    fn apply_delete(&mut self, key: &str) {
        StoreInner::apply_delete(self, key);
    }
}

/// Durable key-value store with an attached vector index.
pub struct Store {
    inner: RwLock<StoreInner>,
    wal: WriteAheadLog,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
    snapshot_every: u64,
    data_dir: PathBuf,
    /// Fixed index dimension, cached so writes validate without the lock.
    index_dim: Option<usize>,
}

impl Store {
    /// Open a store in `data_dir`: load the snapshot if one exists (absence
    /// means start empty), rebuild the index from it, then replay the WAL
    /// tail through the same apply path used at runtime. The result is
    /// byte-identical to the state before the last shutdown or crash.
    pub fn open(
        data_dir: &Path,
        mut index: VectorIndex,
        snapshot_every: u64,
        metrics: Arc<Metrics>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let data = snapshot::load(data_dir)?.unwrap_or_default();
        index.rebuild(&data);

        let wal = WriteAheadLog::open(data_dir.join(WAL_FILE))?;
        let mut inner = StoreInner {
            data,
            index,
            op_count: 0,
        };
        let stats: ReplayStats = wal.replay(&mut inner)?;
        tracing::info!(
            keys = inner.data.len(),
            replayed = stats.applied,
            truncated_tail = stats.truncated,
            "store recovered"
        );

        let index_dim = inner.index.dim();
        Ok(Self {
            inner: RwLock::new(inner),
            wal,
            metrics,
            shutdown,
            snapshot_every,
            data_dir: data_dir.to_path_buf(),
            index_dim,
        })
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShuttingDown);
        }
        Ok(())
    }

    fn check_dim(&self, value_len: usize) -> Result<()> {
        if let Some(expected) = self.index_dim {
            if value_len != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    got: value_len,
                });
            }
        }
        Ok(())
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// WAL append happens before the in-memory apply; the snapshot trigger
    /// clones the map *under* the lock and performs the save and WAL reset
    /// after releasing it, so mutation and persistence I/O never interleave.
    pub fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_shutdown()?;
        self.check_dim(value.len())?;

        self.wal.append_set(key, &value)?;

        let snapshot_data = {
            let mut inner = self.inner.write();
            inner.apply_set(key.to_string(), value);
            inner.op_count += 1;
            self.snapshot_due(&inner)
        };
        if let Some(data) = snapshot_data {
            self.compact(&data);
        }

        self.metrics.inc_writes();
        Ok(())
    }

    /// Fetch the value for `key`. Empty during shutdown.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        if self.shutdown.load(Ordering::Acquire) {
            return None;
        }
        let inner = self.inner.read();
        let value = inner.data.get(key).cloned();
        if value.is_some() {
            self.metrics.inc_reads();
        }
        value
    }

    /// Remove `key` from the map and the index. Deleting an absent key is a
    /// no-op, not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.check_shutdown()?;

        self.wal.append_delete(key)?;

        let snapshot_data = {
            let mut inner = self.inner.write();
            inner.apply_delete(key);
            inner.op_count += 1;
            self.snapshot_due(&inner)
        };
        if let Some(data) = snapshot_data {
            self.compact(&data);
        }

        self.metrics.inc_deletes();
        Ok(())
    }

    /// Apply a replicated Set directly to memory, bypassing the local WAL —
    /// the sender's log owns durability for replicated records.
    pub fn apply_set(&self, key: String, value: Vec<u8>) {
        self.inner.write().apply_set(key, value);
    }

    /// Apply a replicated Delete directly to memory.
    pub fn apply_delete(&self, key: &str) {
        self.inner.write().apply_delete(key);
    }

    /// Similarity search delegated to the vector index.
    pub fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.inner.read().index.search(query, k)
    }

    /// Token-overlap search over stored values interpreted as text.
    pub fn keyword_search(&self, query: &str, k: usize) -> Vec<SearchResult> {
        keyword_search(&self.inner.read().data, query, k)
    }

    /// Run keyword and vector search with a generous candidate pool each,
    /// then fuse with Reciprocal Rank Fusion (keyword list first — ties in
    /// fused score resolve in that discovery order).
    pub fn hybrid_search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let pool = k.saturating_mul(HYBRID_POOL_FACTOR).max(k);
        let (keyword_hits, vector_hits) = {
            let inner = self.inner.read();
            let keyword_hits = keyword_search(&inner.data, query_text, pool);
            let vector_hits = inner.index.search(query_vector, pool)?;
            (keyword_hits, vector_hits)
        };

        let mut fused = rrf_fuse(&[keyword_hits, vector_hits], RRF_K);
        fused.truncate(k);
        Ok(fused)
    }

    /// Snapshot the current map and reset the WAL, regardless of the
    /// operation counter. Used on graceful shutdown.
    pub fn snapshot_now(&self) -> Result<()> {
        let data = self.inner.read().data.clone();
        snapshot::save(&data, &self.data_dir)?;
        self.wal.reset()?;
        Ok(())
    }

    /// Raise the shutdown signal: subsequent reads and writes fail fast,
    /// in-flight operations complete.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Copy-on-write snapshot trigger: clones the map while the caller still
    /// holds the write lock, every `snapshot_every` mutations.
    fn snapshot_due(&self, inner: &StoreInner) -> Option<HashMap<String, Vec<u8>>> {
        (self.snapshot_every > 0 && inner.op_count % self.snapshot_every == 0)
            .then(|| inner.data.clone())
    }

    /// Persist a cloned map and truncate the WAL. Failures are logged, not
    /// surfaced: the triggering write is already durable in the WAL, and the
    /// next interval retries compaction.
    fn compact(&self, data: &HashMap<String, Vec<u8>>) {
        match snapshot::save(data, &self.data_dir) {
            Ok(()) => {
                if let Err(e) = self.wal.reset() {
                    tracing::error!("WAL reset after snapshot failed: {e}");
                } else {
                    tracing::info!("snapshot complete, WAL truncated ({} keys)", data.len());
                }
            }
            Err(e) => tracing::error!("snapshot save failed: {e}"),
        }
    }
}

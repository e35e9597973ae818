//! The replication node: a [`Store`] plus cluster behavior.
//!
//! A leader commits locally first, then fans the mutation out to every
//! healthy peer concurrently, each push bounded by its own timeout. Local
//! commit is acknowledged to the caller regardless of replication outcome.
//! A follower rejects writes and watches the leader's heartbeats, re-running
//! the election once per missed timeout window.

use super::{elect_leader, ClusterConfig, ClusterError, NodeConfig};
use crate::rpc::{ReplicaHandler, ReplicationClient, ReplicationMessage};
use fusekv_core::Store;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

pub struct Node {
    local: NodeConfig,
    peers: Vec<NodeConfig>,
    leader_id: RwLock<String>,
    store: Arc<Store>,
    clients: HashMap<String, ReplicationClient>,
    /// Peers that failed a replication push. Skipped on subsequent writes;
    /// heartbeats still go to them.
    unhealthy: Mutex<HashSet<String>>,
    last_heartbeat: Mutex<Instant>,
    heartbeat_interval: Duration,
    leader_timeout: Duration,
    rpc_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    pub fn new(
        config: ClusterConfig,
        store: Arc<Store>,
        heartbeat_interval: Duration,
        leader_timeout: Duration,
        rpc_timeout: Duration,
    ) -> Arc<Self> {
        let clients = config
            .peers
            .iter()
            .map(|p| {
                (
                    p.id.clone(),
                    ReplicationClient::new(p.address.clone(), rpc_timeout),
                )
            })
            .collect();
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            local: config.local,
            peers: config.peers,
            leader_id: RwLock::new(config.leader_id),
            store,
            clients,
            unhealthy: Mutex::new(HashSet::new()),
            last_heartbeat: Mutex::new(Instant::now()),
            heartbeat_interval,
            leader_timeout,
            rpc_timeout,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.local.id
    }

    pub fn leader_id(&self) -> String {
        self.leader_id.read().clone()
    }

    pub fn is_leader(&self) -> bool {
        *self.leader_id.read() == self.local.id
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Spawn the role-appropriate background task.
    pub fn start(self: &Arc<Self>) {
        let role = if self.is_leader() { "leader" } else { "follower" };
        tracing::info!(
            "node {} starting as {role} (leader: {})",
            self.local.id,
            self.leader_id()
        );

        let handle = if self.is_leader() {
            let node = Arc::clone(self);
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move { node.heartbeat_loop(shutdown).await })
        } else {
            let node = Arc::clone(self);
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move { node.monitor_loop(shutdown).await })
        };
        self.tasks.lock().push(handle);
    }

    /// Signal background tasks and wait for them to finish. In-flight network
    /// calls delay this by at most one RPC timeout.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("background task panicked: {e}");
            }
        }
        tracing::info!("node {} stopped", self.local.id);
    }

    /// Leader write path: local commit, then best-effort fan-out.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), ClusterError> {
        if !self.is_leader() {
            return Err(ClusterError::NotLeader);
        }
        self.store.set(key, value.clone())?;
        self.replicate(ReplicationMessage::set(key, value)).await;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ClusterError> {
        if !self.is_leader() {
            return Err(ClusterError::NotLeader);
        }
        self.store.delete(key)?;
        self.replicate(ReplicationMessage::delete(key)).await;
        Ok(())
    }

    /// Reads are always local; followers serve them too.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    /// Push one mutation to every healthy peer concurrently. Failures mark
    /// the peer unhealthy and bump the failure counter; they never fail the
    /// caller's write.
    async fn replicate(&self, msg: ReplicationMessage) {
        let targets: Vec<(String, ReplicationClient)> = {
            let unhealthy = self.unhealthy.lock();
            self.clients
                .iter()
                .filter(|(id, _)| !unhealthy.contains(*id))
                .map(|(id, client)| (id.clone(), client.clone()))
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        let mut pushes = JoinSet::new();
        for (id, client) in targets {
            let msg = msg.clone();
            pushes.spawn(async move {
                let outcome = client.replicate(&msg).await;
                (id, outcome)
            });
        }

        while let Some(joined) = pushes.join_next().await {
            let Ok((id, outcome)) = joined else { continue };
            if let Err(e) = outcome {
                tracing::warn!("replication to peer {id} failed, marking unhealthy: {e}");
                self.unhealthy.lock().insert(id);
                self.store.metrics().inc_replication_failures();
            }
        }
    }

    /// Peers currently excluded from the replication fan-out.
    pub fn unhealthy_peers(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.unhealthy.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    async fn heartbeat_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.broadcast_heartbeats().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Heartbeats go to all peers, healthy or not, so a recovered follower
    /// keeps seeing the leader as alive.
    async fn broadcast_heartbeats(&self) {
        let mut probes = JoinSet::new();
        for (id, client) in &self.clients {
            let id = id.clone();
            let client = client.clone();
            probes.spawn(async move { (id, client.send_heartbeat().await) });
        }
        while let Some(joined) = probes.join_next().await {
            if let Ok((id, Err(e))) = joined {
                tracing::debug!("heartbeat to peer {id} failed: {e}");
            }
        }
    }

    async fn monitor_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.monitor_tick() && self.is_leader() {
                        tracing::info!("node {} promoted to leader", self.local.id);
                        self.heartbeat_loop(shutdown).await;
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// One monitor step: if the leader's heartbeat has been missing for a
    /// full timeout window, re-run the election and open a fresh window.
    /// Returns whether an election ran. Resetting the timestamp here is what
    /// limits failover to one election per missed window rather than one per
    /// tick.
    pub fn monitor_tick(&self) -> bool {
        {
            let mut last = self.last_heartbeat.lock();
            if last.elapsed() < self.leader_timeout {
                return false;
            }
            *last = Instant::now();
        }

        let previous = self.leader_id();
        let elected = elect_leader(&self.local.id, &self.peers);
        if elected != previous {
            tracing::warn!(
                "leader {previous} missed heartbeat window, elected {elected}"
            );
        } else {
            tracing::warn!("leader {previous} missed heartbeat window, re-elected");
        }
        *self.leader_id.write() = elected;
        true
    }

    /// Milliseconds since the last recorded leader heartbeat.
    pub fn millis_since_heartbeat(&self) -> u128 {
        self.last_heartbeat.lock().elapsed().as_millis()
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }
}

impl ReplicaHandler for Node {
    fn apply_set(&self, key: String, value: Vec<u8>) {
        self.store.apply_set(key, value);
    }

    fn apply_delete(&self, key: &str) {
        self.store.apply_delete(key);
    }

    fn record_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }
}

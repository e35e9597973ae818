use clap::Parser;
use fusekv_core::config::{
    DEFAULT_CENTROID_COUNT, DEFAULT_DIMENSION, DEFAULT_PROBE_COUNT, HEARTBEAT_INTERVAL_MS,
    LEADER_TIMEOUT_MS, RPC_TIMEOUT_MS,
};
use fusekv_core::index::{random_centroids, BruteForceIndex, IvfIndex, VectorIndex};
use fusekv_core::{Metrics, Store};
use fusekv_server::cluster::{ClusterConfig, Node, NodeConfig};
use fusekv_server::config::Settings;
use fusekv_server::rpc::{ReplicaHandler, ReplicationServer};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fusekv", about = "Replicated key-value store with hybrid search")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node identifier (overrides config)
    #[arg(long)]
    node_id: Option<String>,

    /// Data directory for the WAL and snapshots (overrides config)
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Replication listen address (overrides config)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Comma-separated peers in id=host:port form (overrides config)
    #[arg(long)]
    peers: Option<String>,

    /// Mutations between snapshots, 0 disables (overrides config)
    #[arg(long)]
    snapshot_every: Option<u64>,

    /// Vector index: "ivf" or "brute"
    #[arg(long, default_value = "ivf")]
    index: String,

    /// Vector dimension for the IVF index
    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    dimension: usize,

    /// Centroid count for the IVF index
    #[arg(long, default_value_t = DEFAULT_CENTROID_COUNT)]
    centroids: usize,

    /// Buckets probed per IVF search
    #[arg(long, default_value_t = DEFAULT_PROBE_COUNT)]
    probes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "fusekv_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive(
                    "fusekv_core=info"
                        .parse()
                        .expect("valid directive literal"),
                ),
        )
        .init();

    let args = Args::parse();
    let settings = build_settings(&args)?;

    let data_path = Path::new(&settings.data_dir);
    if data_path.exists() && !data_path.is_dir() {
        eprintln!(
            "Error: data_dir '{}' exists but is not a directory",
            settings.data_dir
        );
        std::process::exit(1);
    }

    let index = match args.index.as_str() {
        "brute" => VectorIndex::BruteForce(BruteForceIndex::new()),
        "ivf" => {
            let centroids = random_centroids(args.centroids, args.dimension)?;
            VectorIndex::Ivf(IvfIndex::new(centroids, args.probes)?)
        }
        other => {
            eprintln!("Error: unknown index kind '{other}' (expected \"ivf\" or \"brute\")");
            std::process::exit(1);
        }
    };

    let metrics = Arc::new(Metrics::new());
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let store = Arc::new(Store::open(
        data_path,
        index,
        settings.snapshot_every,
        Arc::clone(&metrics),
        Arc::clone(&shutdown_flag),
    )?);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        node_id = %settings.node_id,
        data_dir = %settings.data_dir,
        listen_addr = %settings.listen_addr,
        peers = settings.peers.len(),
        keys = store.len(),
        "fusekv ready"
    );

    let (listener_shutdown_tx, listener_shutdown_rx) = watch::channel(false);

    let (node, listener_task) = if settings.is_standalone() {
        tracing::info!("standalone mode: replication disabled");
        (None, None)
    } else {
        let local = NodeConfig {
            id: settings.node_id.clone(),
            address: settings.listen_addr.clone(),
        };
        let cluster = ClusterConfig::new(local, settings.peer_configs()?);
        let node = Node::new(
            cluster,
            Arc::clone(&store),
            Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            Duration::from_millis(LEADER_TIMEOUT_MS),
            Duration::from_millis(RPC_TIMEOUT_MS),
        );
        node.start();

        let listener = ReplicationServer::bind(&settings.listen_addr).await?;
        tracing::info!("replication listener on {}", listener.local_addr()?);
        let handler: Arc<dyn ReplicaHandler> = node.clone();
        let listener_task = tokio::spawn(listener.serve(handler, listener_shutdown_rx));

        (Some(node), Some(listener_task))
    };

    wait_for_signal().await;

    // Fail new operations fast, stop background tasks, then take a final
    // snapshot so restart needs no WAL replay.
    store.shutdown();
    if let Some(node) = node {
        node.stop().await;
    }
    let _ = listener_shutdown_tx.send(true);
    if let Some(task) = listener_task {
        if let Err(e) = task.await {
            tracing::warn!("replication listener task panicked: {e}");
        }
    }

    match store.snapshot_now() {
        Ok(()) => tracing::info!("final snapshot written"),
        Err(e) => tracing::error!("final snapshot failed, WAL preserved for recovery: {e}"),
    }

    for (name, count) in metrics.snapshot() {
        tracing::info!("counter {name}={count}");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Defaults, then JSON file, then environment, then CLI flags.
fn build_settings(args: &Args) -> std::io::Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env();

    if let Some(node_id) = &args.node_id {
        settings.node_id = node_id.clone();
    }
    if let Some(data_dir) = &args.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if let Some(listen_addr) = &args.listen_addr {
        settings.listen_addr = listen_addr.clone();
    }
    if let Some(peers) = &args.peers {
        settings.peers = peers
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(snapshot_every) = args.snapshot_every {
        settings.snapshot_every = snapshot_every;
    }
    Ok(settings)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully...");
}

//! Inbound replication listener.
//!
//! Accepts peer connections and dispatches frames into a [`ReplicaHandler`].
//! Each connection gets its own task and may carry any number of frames;
//! the accept loop stops when the shutdown watch flips.

use super::protocol::{
    self, Ack, ReplicationMessage, MSG_HEARTBEAT, MSG_HEARTBEAT_ACK, MSG_REPLICATE,
    MSG_REPLICATE_ACK, OP_DELETE, OP_SET,
};
use super::ReplicaHandler;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

pub struct ReplicationServer {
    listener: TcpListener,
}

impl ReplicationServer {
    /// Bind the listening socket. Binding is separate from serving so callers
    /// can learn the resolved address (port 0) before the loop starts.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Returns once `shutdown` observes `true`.
    pub async fn serve(
        self,
        handler: Arc<dyn ReplicaHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let handler = Arc::clone(&handler);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, handler).await {
                                    tracing::debug!("connection from {peer} closed: {e}");
                                }
                            });
                        }
                        Err(e) => tracing::warn!("accept failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("replication listener stopping");
                        return;
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    handler: Arc<dyn ReplicaHandler>,
) -> io::Result<()> {
    loop {
        let (msg_type, payload) = match protocol::read_message(&mut stream).await {
            Ok(frame) => frame,
            // Clean disconnect between frames.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        match msg_type {
            MSG_REPLICATE => {
                let msg: ReplicationMessage = protocol::decode(&payload)?;
                let success = apply(&msg, handler.as_ref());
                reply(&mut stream, MSG_REPLICATE_ACK, success).await?;
            }
            MSG_HEARTBEAT => {
                handler.record_heartbeat();
                reply(&mut stream, MSG_HEARTBEAT_ACK, true).await?;
            }
            other => {
                tracing::warn!("unknown message type {other:#x}, closing connection");
                return Ok(());
            }
        }
    }
}

fn apply(msg: &ReplicationMessage, handler: &dyn ReplicaHandler) -> bool {
    match (msg.op, &msg.value) {
        (OP_SET, Some(value)) => {
            handler.apply_set(msg.key.clone(), value.clone());
            true
        }
        (OP_DELETE, _) => {
            handler.apply_delete(&msg.key);
            true
        }
        (op, _) => {
            tracing::warn!("malformed replication record (op={op}, key={})", msg.key);
            false
        }
    }
}

async fn reply(stream: &mut TcpStream, msg_type: u32, success: bool) -> io::Result<()> {
    let payload = protocol::encode(&Ack { success })?;
    protocol::write_message(stream, msg_type, &payload).await
}

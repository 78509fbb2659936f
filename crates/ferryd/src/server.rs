//! Server activity — answer handshakes and serve requested files.
//!
//! One bounded receive per pass keeps the loop responsive to both the
//! shutdown flag and the role flag. While the node is in the client role the
//! loop idles without touching the socket, so an outgoing transfer has the
//! wire to itself.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ferry_core::wire::{self, DATA_FRAME_SIZE};
use ferry_transport::session::{ConnectionTable, ServerAction};
use ferry_transport::{sender, RECV_TIMEOUT};

use crate::node::{Node, Role};

/// How long the loop sleeps between role checks while the client role owns
/// the socket.
const ROLE_IDLE: Duration = Duration::from_millis(50);

pub async fn server_loop(node: Arc<Node>) {
    let mut connections = ConnectionTable::new();
    let mut buf = vec![0u8; DATA_FRAME_SIZE];

    tracing::info!(
        port = node.config().port,
        files = node.config().content_info.len(),
        "serving catalog"
    );

    while !node.is_shutdown() {
        if node.role() != Role::Server {
            tokio::time::sleep(ROLE_IDLE).await;
            continue;
        }
        connections.prune();

        let received = match node.link().recv_from(&mut buf, RECV_TIMEOUT).await {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "server receive failed");
                continue;
            }
        };

        let (len, from) = received;
        match connections.handle(from.port(), &buf[..len]) {
            ServerAction::SynAck => {
                tracing::debug!(peer = %from, "SYN received");
                if let Err(e) = node.link().send_to(wire::SYNACK, from).await {
                    tracing::warn!(peer = %from, error = %e, "SYNACK send failed");
                }
            }
            ServerAction::Established => {
                tracing::debug!(peer = %from, "connection established");
            }
            ServerAction::Request(filename) => {
                serve(&node, &mut connections, &filename, from).await;
            }
            ServerAction::Ignore => {
                tracing::trace!(peer = %from, len, "ignoring datagram");
            }
        }
    }

    tracing::debug!("server activity stopped");
}

/// Serve one requested file to an established peer. Any failure here is
/// fatal to this transfer only; the loop keeps serving.
async fn serve(node: &Node, connections: &mut ConnectionTable, filename: &str, peer: SocketAddr) {
    // requests must name a bare file inside the serving directory
    if filename.contains('/') || filename.contains('\\') || filename == ".." {
        tracing::warn!(peer = %peer, filename, "rejecting request outside serving directory");
        connections.complete(peer.port());
        return;
    }

    let path = node.base_dir().join(filename);
    let frames = match sender::frame_file(&path) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(peer = %peer, filename, error = %e, "cannot serve file");
            connections.complete(peer.port());
            return;
        }
    };

    tracing::info!(peer = %peer, filename, frames = frames.len(), "serving file");
    match sender::transmit(node.link(), &frames, peer).await {
        Ok(()) => tracing::info!(peer = %peer, filename, "file served"),
        Err(e) => tracing::warn!(peer = %peer, filename, error = %e, "transfer failed"),
    }

    // the peer re-handshakes for its next request
    connections.complete(peer.port());
}

//! Client activity — resolve queued file requests and fetch them from peers.

use std::sync::Arc;

use tokio::sync::mpsc;

use ferry_transport::receiver;

use crate::node::{Node, Role};

pub async fn client_loop(node: Arc<Node>, mut requests: mpsc::UnboundedReceiver<String>) {
    loop {
        let filename = tokio::select! {
            _ = node.shutdown_notified() => break,
            request = requests.recv() => match request {
                Some(filename) => filename,
                None => break,
            },
        };

        fetch_one(&node, &filename).await;
        node.set_role(Role::Server);
    }

    tracing::debug!("client activity stopped");
}

async fn fetch_one(node: &Node, filename: &str) {
    // lookup first: an unknown file is reported without sending any packet
    let Some(peer) = node.directory().find_holder(filename) else {
        tracing::warn!(filename, "no peer advertises this file");
        return;
    };
    let addr = match peer.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(peer = %peer.hostname, error = %e, "cannot resolve peer address");
            return;
        }
    };

    node.set_role(Role::Client);
    tracing::info!(filename, peer = %addr, "fetching file");

    match receiver::fetch(node.link(), addr, filename, node.base_dir()).await {
        Ok(path) => tracing::info!(filename, path = %path.display(), "file received"),
        Err(e) => tracing::warn!(filename, peer = %addr, error = %e, "fetch failed"),
    }
}

//! ferryd — peer-to-peer file-distribution node.
//!
//! One process plays both sides of the ferry transport: it serves its own
//! catalog to peers, fetches files it lacks from whichever peer advertises
//! them, and takes operator commands on stdin. Three concurrent activities
//! share one UDP socket, coordinated by the node's role flag.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use ferry_core::{peer, NodeConfig};

mod client;
mod console;
mod node;
mod server;

use node::Node;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: ferryd <node-config.toml>")?;

    let config =
        NodeConfig::load(&config_path).context("failed to load node configuration")?;

    let bind_addr = peer::resolve_addr(&config.hostname, config.port)
        .with_context(|| format!("cannot resolve bind address {}", config.hostname))?;
    let socket = UdpSocket::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind UDP socket on {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "socket bound");

    let node = Node::new(config, &config_path, socket);
    log_startup_banner(&node);

    // Ctrl-C stops the node the same way the kill command does
    {
        let node = node.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("interrupt received, shutting down");
            node.request_shutdown();
        });
    }

    let (request_tx, request_rx) = mpsc::unbounded_channel::<String>();

    let server_task = tokio::spawn(server::server_loop(node.clone()));
    let client_task = tokio::spawn(client::client_loop(node.clone(), request_rx));
    let console_task = tokio::spawn(console::console_loop(node.clone(), request_tx));

    let _ = tokio::join!(server_task, client_task, console_task);

    tracing::info!("node stopped");
    Ok(())
}

fn log_startup_banner(node: &Arc<Node>) {
    let config = node.config();
    tracing::info!(
        port = config.port,
        hostname = %config.hostname,
        peers = node.directory().len(),
        "ferryd starting"
    );
    for file in &config.content_info {
        tracing::info!(file = %file, "catalog entry");
    }
    for peer in node.directory().iter() {
        tracing::info!(
            hostname = %peer.hostname,
            port = peer.port,
            files = peer.content_info.len(),
            "known peer"
        );
    }
}

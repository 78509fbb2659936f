//! Operator console — line-oriented commands on stdin.
//!
//! `kill` shuts the node down; every other non-empty line is treated as a
//! filename request: the role flag switches to the client side and the name
//! joins the FIFO request queue.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::node::{Node, Role};

pub async fn console_loop(node: Arc<Node>, requests: mpsc::UnboundedSender<String>) {
    // Stdin is read on a plain OS thread; a detached thread cannot keep the
    // process alive once the async side has shut down.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        let line = tokio::select! {
            _ = node.shutdown_notified() => break,
            line = line_rx.recv() => match line {
                Some(line) => line,
                None => break, // stdin closed
            },
        };

        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "kill" {
            tracing::info!("kill received, shutting down");
            node.request_shutdown();
            break;
        }

        tracing::info!(filename = command, "queued file request");
        node.set_role(Role::Client);
        if requests.send(command.to_string()).is_err() {
            break;
        }
    }

    tracing::debug!("console activity stopped");
}

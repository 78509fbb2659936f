//! Server-side connection tracking — handshake state per remote endpoint.
//!
//! The server activity feeds every inbound datagram through the table and
//! acts on the returned [`ServerAction`]. Peers are identified by their UDP
//! source port, the transport-level identity in this design. Entries are
//! dropped when a transfer completes and pruned after a quiet interval, so
//! the table stays bounded however long the node runs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ferry_core::wire;

/// Handshake progress for one remote port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// SYN seen, SYNACK owed/sent, waiting for the confirming ACK.
    SynReceived,
    /// Handshake complete; the next payload is a file request.
    Established,
}

/// What the server activity should do with an inbound datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum ServerAction {
    /// Reply to the source with SYNACK.
    SynAck,
    /// Handshake completed; nothing to send.
    Established,
    /// An established peer asked for this file.
    Request(String),
    /// Not part of any exchange we recognize; drop it.
    Ignore,
}

/// Entries idle longer than this are evicted on the next prune pass.
pub const CONNECTION_TTL: Duration = Duration::from_secs(60);

struct Connection {
    state: ConnectionState,
    last_seen: Instant,
}

/// Per-source-port handshake table.
#[derive(Default)]
pub struct ConnectionTable {
    entries: HashMap<u16, Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the state machine for `port` with one inbound datagram.
    ///
    /// SYN always (re)arms the handshake, so a peer can start a fresh
    /// transfer at any time. An ACK without a preceding SYN, and any payload
    /// from a port that is not established, are ignored.
    pub fn handle(&mut self, port: u16, datagram: &[u8]) -> ServerAction {
        let now = Instant::now();

        if datagram == wire::SYN {
            self.entries.insert(
                port,
                Connection {
                    state: ConnectionState::SynReceived,
                    last_seen: now,
                },
            );
            return ServerAction::SynAck;
        }

        if datagram == wire::ACK {
            match self.entries.get_mut(&port) {
                Some(conn) if conn.state == ConnectionState::SynReceived => {
                    conn.state = ConnectionState::Established;
                    conn.last_seen = now;
                    return ServerAction::Established;
                }
                _ => return ServerAction::Ignore,
            }
        }

        match self.entries.get_mut(&port) {
            Some(conn) if conn.state == ConnectionState::Established => {
                conn.last_seen = now;
                match std::str::from_utf8(datagram) {
                    Ok(name) => ServerAction::Request(name.to_string()),
                    Err(_) => ServerAction::Ignore,
                }
            }
            _ => ServerAction::Ignore,
        }
    }

    /// The transfer for `port` finished (or failed); the peer re-handshakes
    /// for its next request.
    pub fn complete(&mut self, port: u16) {
        self.entries.remove(&port);
    }

    /// Evict entries that have been quiet past [`CONNECTION_TTL`].
    pub fn prune(&mut self) {
        let cutoff = Instant::now() - CONNECTION_TTL;
        self.entries.retain(|_, conn| conn.last_seen > cutoff);
    }

    pub fn state(&self, port: u16) -> Option<ConnectionState> {
        self.entries.get(&port).map(|c| c.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

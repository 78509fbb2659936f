//! ferry-transport — reliable, in-order file delivery over UDP.
//!
//! The ferry ARQ: a fixed-size sliding window with cumulative
//! acknowledgments and go-back-N retransmission, preceded by a three-way
//! handshake. The sender and receiver halves share one UDP socket through
//! [`Link`], which serializes individual socket calls so the node's two
//! transport roles never interleave on the wire.

use std::time::Duration;

pub mod error;
pub mod link;
pub mod receiver;
pub mod sender;
pub mod session;

pub use error::TransferError;
pub use link::Link;

// ── Protocol parameters ───────────────────────────────────────────────────────

/// Sender window size, in frames.
pub const TX_WINDOW_SIZE: u32 = 50;

/// Total time the sender waits for acknowledgment progress before it resends
/// the in-flight window.
pub const ARQ_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the receiver waits for the handshake response.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on every receive inside a transfer loop, so the shutdown flag is
/// observed promptly.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Consecutive no-progress rounds before a transfer is abandoned. Applies to
/// sender ARQ rounds and to empty receiver windows alike; with 500 ms rounds
/// this is roughly twenty seconds of silence.
pub const STALL_LIMIT: u32 = 40;

/// Prefix under which received files are written.
pub const RECEIVED_PREFIX: &str = "received_";

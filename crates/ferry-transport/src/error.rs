//! Transfer-level error taxonomy.
//!
//! Nothing in this enum aborts the process. A failed handshake, a stalled
//! window, or an unwritable output file ends one transfer; the node's
//! activities report it and keep running. Configuration and socket-setup
//! failures are the daemon's concern and never reach this type.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("no handshake response within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("unexpected handshake response: {0:?}")]
    HandshakeUnexpected(String),

    #[error("transfer stalled: no acknowledgment progress after {rounds} retransmission rounds")]
    Stalled { rounds: u32 },

    #[error("peer went silent: nothing received for {idle_rounds} consecutive windows")]
    Idle { idle_rounds: u32 },

    #[error("could not read source file {path}: {source}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write output file {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("shutdown requested")]
    Shutdown,
}

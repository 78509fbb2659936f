//! Reliable receiver — handshake, file request, and in-order reassembly.
//!
//! Frames are accepted only in strict sequence order; each accepted frame is
//! acknowledged cumulatively, and an out-of-order or duplicate frame causes
//! the last acknowledgment to be repeated so the sender keeps its window
//! anchored. No receive-side reordering buffer exists, so assembly output is
//! simply the accepted payloads in arrival order.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use ferry_core::wire::{self, AckFrame, DataFrame, DATA_FRAME_SIZE};
use zerocopy::AsBytes;

use crate::{Link, TransferError, HANDSHAKE_TIMEOUT, RECEIVED_PREFIX, RECV_TIMEOUT, STALL_LIMIT};

// ── Assembly state ────────────────────────────────────────────────────────────

/// What to do with one offered frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Accepted {
    /// The frame was next in sequence: acknowledge `ack`, and stop receiving
    /// when `done` is set.
    InOrder { ack: u32, done: bool },
    /// Duplicate or out-of-order: discard the payload and repeat the last
    /// acknowledgment, if any was sent yet.
    OutOfOrder { resend: Option<u32> },
}

/// In-order reassembly state for one incoming transfer.
#[derive(Debug, Default)]
pub struct RxAssembly {
    expected: u32,
    last_ack: Option<u32>,
    frames: Vec<DataFrame>,
}

impl RxAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a received frame. Acceptance is strictly in-order; anything
    /// else leaves the state untouched apart from telling the caller which
    /// acknowledgment to repeat.
    pub fn offer(&mut self, frame: DataFrame) -> Accepted {
        let seq = frame.seq();
        if seq != self.expected {
            return Accepted::OutOfOrder {
                resend: self.last_ack,
            };
        }
        let done = frame.is_last();
        self.expected += 1;
        self.last_ack = Some(seq);
        self.frames.push(frame);
        Accepted::InOrder { ack: seq, done }
    }

    /// The next sequence number required for acceptance.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn frames_accepted(&self) -> usize {
        self.frames.len()
    }

    /// The reassembled byte stream. Frames were accepted in sequence order,
    /// so this is a straight concatenation of payloads.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frames.iter().map(|f| f.payload_len()).sum());
        for frame in &self.frames {
            bytes.extend_from_slice(frame.payload());
        }
        bytes
    }
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Three-way handshake with `server`: SYN, expect SYNACK, confirm with ACK.
///
/// The whole exchange runs under one socket-exclusive section so the node's
/// server activity cannot interleave a receive between our SYN and the
/// server's reply. Any response other than SYNACK, or silence past the
/// timeout, fails this attempt; neither can hang.
async fn handshake(link: &Link, server: SocketAddr) -> Result<(), TransferError> {
    let io = link.exclusive().await;
    let mut buf = [0u8; 64];

    io.send_to(wire::SYN, server).await?;
    tracing::debug!(%server, "sent SYN");

    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(TransferError::HandshakeTimeout(HANDSHAKE_TIMEOUT));
        }
        let received = io.recv_from(&mut buf, deadline - now).await?;
        let Some((len, from)) = received else {
            return Err(TransferError::HandshakeTimeout(HANDSHAKE_TIMEOUT));
        };
        if from != server {
            tracing::trace!(%from, "ignoring datagram from unrelated peer during handshake");
            continue;
        }
        if &buf[..len] != wire::SYNACK {
            let got = String::from_utf8_lossy(&buf[..len]).into_owned();
            return Err(TransferError::HandshakeUnexpected(got));
        }
        break;
    }

    io.send_to(wire::ACK, server).await?;
    tracing::debug!(%server, "connection established");
    Ok(())
}

// ── Fetch ─────────────────────────────────────────────────────────────────────

/// Request `filename` from `server` and reconstruct it under `out_dir`.
///
/// The output file keeps the original name behind the `received_` prefix and
/// is byte-for-byte identical to the peer's copy. Handshake failure and an
/// unwritable output are fatal to this transfer only.
pub async fn fetch(
    link: &Link,
    server: SocketAddr,
    filename: &str,
    out_dir: &Path,
) -> Result<PathBuf, TransferError> {
    handshake(link, server).await?;

    link.send_to(filename.as_bytes(), server).await?;
    tracing::debug!(%server, filename, "requested file");

    let mut assembly = RxAssembly::new();
    let mut idle_rounds = 0u32;
    let mut buf = vec![0u8; DATA_FRAME_SIZE];

    loop {
        if link.is_shutdown() {
            return Err(TransferError::Shutdown);
        }

        let received = match link.recv_from(&mut buf, RECV_TIMEOUT).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                idle_rounds += 1;
                if idle_rounds >= STALL_LIMIT {
                    return Err(TransferError::Idle { idle_rounds });
                }
                tracing::trace!(expected = assembly.expected(), "no frame this round");
                continue;
            }
            Err(e) => {
                // transient: count it as a silent round
                tracing::warn!(error = %e, "frame receive failed");
                idle_rounds += 1;
                if idle_rounds >= STALL_LIMIT {
                    return Err(TransferError::Idle { idle_rounds });
                }
                continue;
            }
        };

        let (len, from) = received;
        if from != server {
            tracing::trace!(%from, "ignoring datagram from unrelated peer");
            continue;
        }
        let Some(frame) = DataFrame::decode(&buf[..len]) else {
            tracing::trace!(len, "ignoring malformed datagram");
            continue;
        };
        idle_rounds = 0;

        let seq = frame.seq();
        match assembly.offer(frame) {
            Accepted::InOrder { ack, done } => {
                send_ack(link, ack, server).await;
                if done {
                    break;
                }
            }
            Accepted::OutOfOrder { resend } => {
                tracing::trace!(
                    seq,
                    expected = assembly.expected(),
                    "out-of-order frame discarded"
                );
                if let Some(ack) = resend {
                    send_ack(link, ack, server).await;
                }
            }
        }
    }

    let out_path = out_dir.join(format!("{RECEIVED_PREFIX}{filename}"));
    let frames = assembly.frames_accepted();
    std::fs::write(&out_path, assembly.into_bytes()).map_err(|source| {
        TransferError::OutputWrite {
            path: out_path.clone(),
            source,
        }
    })?;

    tracing::info!(path = %out_path.display(), frames, "file received");
    Ok(out_path)
}

async fn send_ack(link: &Link, ack_num: u32, server: SocketAddr) {
    let ack = AckFrame::new(ack_num);
    if let Err(e) = link.send_to(ack.as_bytes(), server).await {
        // transient: the sender repeats the window and we re-ack then
        tracing::warn!(ack = ack_num, error = %e, "ack send failed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

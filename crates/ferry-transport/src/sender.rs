//! Reliable sender — file segmentation and the go-back-N ARQ drive.
//!
//! Segmentation turns a file into a contiguous run of data frames; the drive
//! loop pushes them across the network with a fixed-size sliding window,
//! resending the whole in-flight window whenever a timeout passes with no
//! acknowledgment progress. [`TxWindow`] holds the window state and performs
//! no I/O; all socket work happens in [`transmit`].

use std::net::SocketAddr;
use std::ops::Range;
use std::path::Path;
use std::time::Instant;

use ferry_core::wire::{AckFrame, DataFrame, DATA_FRAME_SIZE, PAYLOAD_CAPACITY};
use zerocopy::AsBytes;

use crate::{Link, TransferError, ARQ_TIMEOUT, STALL_LIMIT, TX_WINDOW_SIZE};

// ── Segmentation ──────────────────────────────────────────────────────────────

/// Segment a file into data frames.
pub fn frame_file(path: &Path) -> Result<Vec<DataFrame>, TransferError> {
    let data = std::fs::read(path).map_err(|source| TransferError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(frame_bytes(&data))
}

/// Segment a byte buffer into data frames with sequence numbers `0..N-1`.
///
/// The final frame is always strictly shorter than the payload capacity:
/// when the input length is an exact multiple of the capacity (including
/// the empty input) a trailing zero-payload terminating frame is appended.
/// Finality on the wire is therefore `payload_size < capacity` and nothing
/// else, and the receiver needs no special case.
pub fn frame_bytes(data: &[u8]) -> Vec<DataFrame> {
    let mut frames = Vec::with_capacity(data.len() / PAYLOAD_CAPACITY + 1);
    for (seq, chunk) in data.chunks(PAYLOAD_CAPACITY).enumerate() {
        frames.push(DataFrame::new(seq as u32, chunk));
    }
    if data.len() % PAYLOAD_CAPACITY == 0 {
        frames.push(DataFrame::new(frames.len() as u32, &[]));
    }
    frames
}

// ── Window state ──────────────────────────────────────────────────────────────

/// Sliding-window bookkeeping for one outgoing transfer.
///
/// ```text
///    base            next
///     │                │
///  ───┼────────────────┼──────────────▶ sequence space
///     │ ◀─ in flight ─▶│ ◀─ sendable up to base + window
/// ```
///
/// Invariant: `base ≤ next ≤ base + window` and `next ≤ total`, after every
/// send, ACK, and timeout step. `base` never decreases.
#[derive(Debug)]
pub struct TxWindow {
    base: u32,
    next: u32,
    window: u32,
    total: u32,
}

impl TxWindow {
    /// `total` is the frame count of the transfer; `window` the fixed number
    /// of frames allowed in flight at once (≥ 1).
    pub fn new(total: u32, window: u32) -> Self {
        assert!(window >= 1, "window must be at least 1");
        Self {
            base: 0,
            next: 0,
            window,
            total,
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next(&self) -> u32 {
        self.next
    }

    /// The sequence number to transmit now, if the window has room and
    /// unsent frames remain. Call [`record_sent`](Self::record_sent) after
    /// actually transmitting it.
    pub fn next_to_send(&self) -> Option<u32> {
        (self.next < self.base + self.window && self.next < self.total).then_some(self.next)
    }

    pub fn record_sent(&mut self) {
        self.next += 1;
        debug_assert!(self.invariant_holds());
    }

    /// Apply a cumulative ACK. An `ack_num` in `[base, next)` advances
    /// `base` to exactly `ack_num + 1` and returns true; stale ACKs for
    /// already-confirmed frames and out-of-range ACKs change nothing.
    pub fn on_ack(&mut self, ack_num: u32) -> bool {
        if ack_num < self.base || ack_num >= self.next {
            return false;
        }
        self.base = ack_num + 1;
        debug_assert!(self.invariant_holds());
        true
    }

    /// Frames sent but not yet cumulatively acknowledged — the go-back-N
    /// retransmission set.
    pub fn in_flight(&self) -> Range<u32> {
        self.base..self.next
    }

    pub fn is_complete(&self) -> bool {
        self.base == self.total
    }

    fn invariant_holds(&self) -> bool {
        self.base <= self.next && self.next <= self.base + self.window && self.next <= self.total
    }
}

// ── Drive loop ────────────────────────────────────────────────────────────────

/// Drive a framed file to `dest` until every frame is acknowledged.
///
/// Send-level socket errors are logged and left to the retransmission
/// machinery; they never abort the transfer. The transfer fails only on
/// shutdown or after [`STALL_LIMIT`] consecutive rounds without progress.
pub async fn transmit(
    link: &Link,
    frames: &[DataFrame],
    dest: SocketAddr,
) -> Result<(), TransferError> {
    let total = frames.len() as u32;
    let mut window = TxWindow::new(total, TX_WINDOW_SIZE);
    let mut stalled_rounds = 0u32;
    let mut buf = vec![0u8; DATA_FRAME_SIZE];

    tracing::debug!(%dest, frames = total, "transfer starting");

    while !window.is_complete() {
        if link.is_shutdown() {
            return Err(TransferError::Shutdown);
        }

        while let Some(seq) = window.next_to_send() {
            send_frame(link, &frames[seq as usize], dest).await;
            window.record_sent();
        }

        if wait_for_acks(link, &mut window, dest, &mut buf).await? {
            stalled_rounds = 0;
            continue;
        }

        stalled_rounds += 1;
        if stalled_rounds >= STALL_LIMIT {
            return Err(TransferError::Stalled {
                rounds: stalled_rounds,
            });
        }

        let in_flight = window.in_flight();
        tracing::debug!(
            from = in_flight.start,
            to = in_flight.end,
            "ack timeout, resending window"
        );
        for seq in in_flight {
            if link.is_shutdown() {
                return Err(TransferError::Shutdown);
            }
            send_frame(link, &frames[seq as usize], dest).await;
        }
    }

    tracing::debug!(%dest, frames = total, "transfer complete");
    Ok(())
}

async fn send_frame(link: &Link, frame: &DataFrame, dest: SocketAddr) {
    if let Err(e) = link.send_to(frame.as_bytes(), dest).await {
        // transient: the frame counts as lost and retransmission covers it
        tracing::warn!(seq = frame.seq(), error = %e, "frame send failed");
    }
}

/// Collect acknowledgments until the ARQ timeout elapses, the window
/// completes, or progress frees room for unsent frames. Returns whether
/// `base` advanced. Datagrams from other peers and datagrams that do not
/// parse as an exact-size ACK are ignored.
async fn wait_for_acks(
    link: &Link,
    window: &mut TxWindow,
    dest: SocketAddr,
    buf: &mut [u8],
) -> Result<bool, TransferError> {
    let deadline = Instant::now() + ARQ_TIMEOUT;
    let mut progressed = false;

    loop {
        if link.is_shutdown() {
            return Err(TransferError::Shutdown);
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        let received = match link.recv_from(buf, deadline - now).await {
            Ok(Some(r)) => r,
            Ok(None) => break,
            Err(e) => {
                // transient: treat the round as silent and let go-back-N run
                tracing::warn!(error = %e, "ack receive failed");
                break;
            }
        };

        let (len, from) = received;
        if from != dest {
            tracing::trace!(%from, "ignoring datagram from unrelated peer");
            continue;
        }
        let Some(ack) = AckFrame::decode(&buf[..len]) else {
            tracing::trace!(len, "ignoring non-ack datagram during ack wait");
            continue;
        };
        let ack_num = { ack.ack_num };
        if window.on_ack(ack_num) {
            progressed = true;
            tracing::trace!(ack = ack_num, base = window.base(), "window advanced");
            // done, or room freed for unsent frames: hand control back
            if window.is_complete() || window.next_to_send().is_some() {
                break;
            }
        }
    }

    Ok(progressed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Ferry wire format — the on-wire frames for all node communication.
//!
//! Every UDP datagram carries exactly one frame, so datagram boundaries
//! double as frame boundaries and no length prefix is needed. Decoding
//! requires the exact fixed size; a shorter or longer datagram is "no usable
//! frame this round" for the caller, never an error that aborts a transfer.
//!
//! All types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. Multi-byte
//! fields are native byte order: every peer in a deployment shares one host
//! address, so the frames never cross an endianness boundary.

use std::fmt;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Fixed payload capacity of a data frame, in bytes.
pub const PAYLOAD_CAPACITY: usize = 4096;

/// Wire size of a serialized [`DataFrame`].
pub const DATA_FRAME_SIZE: usize = std::mem::size_of::<DataFrame>();

/// Wire size of a serialized [`AckFrame`].
pub const ACK_FRAME_SIZE: usize = std::mem::size_of::<AckFrame>();

/// Handshake token: client opens a connection.
pub const SYN: &[u8] = b"SYN";

/// Handshake token: server accepts the open.
pub const SYNACK: &[u8] = b"SYNACK";

/// Handshake token: client confirms, connection established.
pub const ACK: &[u8] = b"ACK";

// ── Data frame ────────────────────────────────────────────────────────────────

/// One transport protocol data unit.
///
/// Within one transfer, frames form a contiguous sequence `0..N-1`. Exactly
/// one frame has the end flag set and it has the highest sequence number;
/// finality is `payload_size < PAYLOAD_CAPACITY`, nothing else. Bytes of
/// `data` beyond `payload_size` are padding: zero-filled on write, ignored
/// on read.
///
/// Wire size: 4105 bytes (4 sequence + 4 payload_size + 1 end + 4096 data).
#[derive(Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct DataFrame {
    /// Strictly increasing per transfer, starting at 0.
    pub sequence_number: u32,

    /// Number of valid bytes in `data`. At most PAYLOAD_CAPACITY.
    pub payload_size: u32,

    /// Non-zero iff this frame is the last of the transfer.
    pub end: u8,

    /// Payload bytes, zero-padded past `payload_size`.
    pub data: [u8; PAYLOAD_CAPACITY],
}

assert_eq_size!(DataFrame, [u8; 4105]);

impl DataFrame {
    /// Build a frame from a payload slice.
    ///
    /// The end flag is derived, not chosen: a frame is final exactly when its
    /// payload is strictly shorter than the capacity. Segmentation guarantees
    /// the last frame of a transfer is always short (see the sender).
    ///
    /// # Panics
    ///
    /// Panics if `payload` exceeds [`PAYLOAD_CAPACITY`].
    pub fn new(sequence_number: u32, payload: &[u8]) -> Self {
        assert!(
            payload.len() <= PAYLOAD_CAPACITY,
            "payload of {} bytes exceeds frame capacity",
            payload.len()
        );
        let mut frame = Self::new_zeroed();
        frame.sequence_number = sequence_number;
        frame.payload_size = payload.len() as u32;
        frame.end = (payload.len() < PAYLOAD_CAPACITY) as u8;
        frame.data[..payload.len()].copy_from_slice(payload);
        frame
    }

    /// Parse a received datagram. Requires the exact wire size and a
    /// `payload_size` within capacity; anything else is not a data frame.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let frame = Self::read_from(bytes)?;
        if frame.payload_size as usize > PAYLOAD_CAPACITY {
            return None;
        }
        Some(frame)
    }

    // Packed fields must be copied out, never referenced.

    pub fn seq(&self) -> u32 {
        self.sequence_number
    }

    pub fn payload_len(&self) -> usize {
        (self.payload_size as usize).min(PAYLOAD_CAPACITY)
    }

    pub fn is_last(&self) -> bool {
        self.end != 0
    }

    /// The valid payload bytes, padding excluded.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.payload_len()]
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seq = self.sequence_number;
        let size = self.payload_size;
        f.debug_struct("DataFrame")
            .field("sequence_number", &seq)
            .field("payload_size", &size)
            .field("end", &self.is_last())
            .finish_non_exhaustive()
    }
}

// ── Acknowledgment frame ──────────────────────────────────────────────────────

/// Cumulative acknowledgment: `ack_num` is the highest contiguous sequence
/// number the receiver has accepted, and implicitly confirms everything
/// below it.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct AckFrame {
    pub ack_num: u32,
}

assert_eq_size!(AckFrame, [u8; 4]);

impl AckFrame {
    pub fn new(ack_num: u32) -> Self {
        Self { ack_num }
    }

    /// Parse a received datagram. Requires the exact wire size.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Self::read_from(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Per-boundary error enums (component C8, SPEC_FULL.md §4.8).
//!
//! Grounded on `vex-v5-serial/src/connection/mod.rs`'s `ConnectionError`:
//! one `thiserror` enum per layer, wrapping the lower layer's error as a
//! source rather than flattening everything into a single crate-wide type.

use std::io;

use thiserror::Error;

/// Framing-layer failures (component C2).
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame marker byte was 0x{0:02x}, expected 0x7e")]
    BadMarker(u8),
    #[error("CRC mismatch: frame carried 0x{frame:02x}, computed 0x{computed:02x}")]
    CrcMismatch { frame: u8, computed: u8 },
    #[error("payload of {0} bytes does not fit in a 63-byte content area after stuffing")]
    PayloadTooLarge(usize),
    #[error("unrecognized message type code 0x{0:02x}")]
    UnknownMessageType(u8),
}

/// Transport-layer failures (component C3).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error on frame transport: {0}")]
    Io(#[from] io::Error),
    #[error("receive timed out with no frame observed")]
    Timeout,
}

/// Requester session failures (component C5).
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("sink I/O error: {0}")]
    Sink(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("not enough disk space: need {needed} bytes, {available} available")]
    DiskSpace { needed: u64, available: u64 },
    #[error("responder reported an error: {0}")]
    Remote(String),
    #[error("unexpected reply during handshake: {0}")]
    UnexpectedReply(&'static str),
}

/// Responder session failures (component C6). Resource errors are not
/// normally surfaced this way — they are turned into an `ERROR` frame by
/// the session itself — but transport failures during the serve loop
/// still need somewhere to go.
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("asset I/O error: {0}")]
    Asset(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

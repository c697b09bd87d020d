//! A reliable file-transfer and directory-listing protocol that runs
//! directly over raw Ethernet frames, with no IP/UDP/TCP stack
//! underneath. Two endpoints — a requester and a responder — exchange a
//! fixed 68-byte envelope; a sliding window of positive/negative
//! acknowledgements drives retransmission.
//!
//! ## Layering
//!
//! - [`crc`] — the 8-bit checksum covering a frame's header and payload.
//! - [`message`] — the closed set of operation codes a frame can carry.
//! - [`frame`] — the 68-byte envelope itself: header packing, byte
//!   stuffing, CRC placement.
//! - [`transport`] — the [`transport::FrameTransport`] trait an opaque
//!   link sits behind, plus an in-memory loopback implementation used
//!   by tests.
//! - [`requester`] and [`responder`] — the two session state machines
//!   that drive a transfer over a [`transport::FrameTransport`].
//! - [`dispatcher`] — the one-shot requester wrapper and the
//!   responder's accept loop.
//! - [`assets`] — asset directory resolution for the responder.
//! - [`config`] — tunable session parameters (window size, timeouts,
//!   retry budget, asset root).
//! - [`error`] — the per-layer error enums the above return.
//!
//! ## Example
//!
//! ```
//! use l2xfer::config::Config;
//! use l2xfer::message::MessageType;
//! use l2xfer::requester::{self, Request};
//! use l2xfer::responder;
//! use l2xfer::transport::{FrameTransport, LoopbackTransport};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut requester_side, mut responder_side) = LoopbackTransport::pair();
//! let config = Config::default();
//!
//! // A responder serving an empty directory listing (scenario S1).
//! responder_side.send(&l2xfer::frame::Frame::encode(MessageType::Ack, 0, &[])?)?;
//! responder_side.send(&l2xfer::frame::Frame::encode(MessageType::End, 0, &[])?)?;
//!
//! let mut out = Vec::new();
//! let outcome = requester::start(Request::Ls, &mut requester_side, &config, &mut out)?;
//! assert_eq!(outcome, requester::Outcome::Completed);
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod crc;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod message;
pub mod requester;
pub mod responder;
pub mod transport;

#[cfg(target_os = "linux")]
pub mod linux_socket;

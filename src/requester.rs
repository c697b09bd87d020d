//! Requester session state machine (component C5, SPEC_FULL.md §4.5).
//!
//! Grounded on `original_source/client/src/context.c`
//! (`context_update_with_data/descriptor/show`) and `client/src/main.c`
//! (the initial handshake retry loop). The reference's 1/0 return-code
//! convention is recast as an explicit `Result`/`Outcome` pair per
//! spec.md §9's "Exception/error propagation" note.

use std::io::Write;
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::config::Config;
use crate::error::RequesterError;
use crate::frame::{Frame, MAX_INDEX};
use crate::message::MessageType;
use crate::transport::{FrameTransport, BLOCK};

/// What the requester asked for.
pub enum Request {
    Ls,
    Download(PathBuf),
}

/// How the session ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The transfer ran to completion (END/ACK handshake exchanged).
    Completed,
    /// The responder rejected the request; `message` is the payload it
    /// sent back. The caller already received and printed the reply;
    /// this variant tells the dispatcher to suppress `--exec`.
    RemoteError(String),
}

fn has_disk_space(required: u64) -> bool {
    match nix::sys::statvfs::statvfs(".") {
        Ok(st) => (st.fragment_size() as u64) * (st.blocks_available() as u64) > required,
        Err(_) => false,
    }
}

/// Runs a requester session to completion against `transport`. For
/// `Request::Ls`, directory entries are written to `listing_out` as
/// they arrive; for `Request::Download`, a file is created at the
/// given path and filled byte-for-byte as DATA frames arrive.
pub fn start(
    request: Request,
    transport: &mut dyn FrameTransport,
    config: &Config,
    listing_out: &mut dyn Write,
) -> Result<Outcome, RequesterError> {
    let is_download = matches!(request, Request::Download(_));

    let initial = match &request {
        Request::Ls => Frame::encode(MessageType::Ls, 0, &[])?,
        Request::Download(path) => {
            let name = path.to_string_lossy();
            Frame::encode(MessageType::Download, 0, name.as_bytes())?
        }
    };

    // Steps 1-2: send the opening request, resending it whenever the
    // reply is neither a recognized opener response nor an error,
    // mirroring main.c's retry loop.
    let opening_reply = loop {
        transport.send(&initial)?;
        let reply = transport.recv(BLOCK)?.expect("BLOCK recv always yields a frame or errors");
        let ty = match reply.message_type() {
            Some(ty) => ty,
            None => continue,
        };
        if ty.is_error() {
            let message = String::from_utf8_lossy(&reply.payload()).into_owned();
            debug!("responder reported an error: {message}");
            writeln!(listing_out, "\x1b[31m{message}\x1b[0m")?;
            transport.send(&Frame::encode(MessageType::Ack, 0, &[])?)?;
            return Ok(Outcome::RemoteError(message));
        }
        if (!is_download && ty.is_ack()) || (is_download && ty.is_descriptor()) {
            break reply;
        }
        trace!("unrecognized opening reply (type 0x{:02x}), resending request", ty.code());
    };

    let mut sink: Sink<'_> = match &request {
        Request::Download(path) => Sink::File(std::fs::File::create(path)?),
        Request::Ls => Sink::Listing(listing_out),
    };

    let mut expected_index: u8 = 0;
    let mut bytes_received: u64 = 0;

    if is_download {
        // Step 4: verify the descriptor and reply with ACK/NACK.
        let reported_size = {
            let payload = opening_reply.payload();
            if payload.len() == 8 {
                Some(u64::from_le_bytes(payload.try_into().unwrap()))
            } else {
                None
            }
        };
        match reported_size {
            Some(size) if opening_reply.index() == 0 && has_disk_space(size) => {
                debug!("descriptor reports {size} bytes, disk space check passed");
                transport.send(&Frame::encode(MessageType::Ack, 0, &[])?)?;
                // The responder's first DATA frame is index 1 (index 0 is
                // reserved for DESCRIPTOR); advance past it here so the
                // window loop's expected_index agrees with the wire.
                expected_index = (expected_index + 1) % MAX_INDEX;
            }
            Some(size) => {
                warn!(
                    "descriptor check failed (index={}, size={size}), NACKing",
                    opening_reply.index()
                );
                transport.send(&Frame::encode(MessageType::Nack, expected_index, &[])?)?;
                return Err(RequesterError::DiskSpace { needed: size, available: 0 });
            }
            None => {
                return Err(RequesterError::UnexpectedReply("descriptor payload was not 8 bytes"));
            }
        }
    }

    let mut completed = false;
    let mut skip = false;
    let mut outbound_reply: Option<Frame> = None;

    // LS never widens past a single in-flight SHOW: the responder produces
    // one directory entry per round and waits for the reply before
    // advancing its iterator (see responder::serve_ls). Only DOWNLOAD uses
    // the full sliding window.
    let window_size: u8 = if is_download { config.window_size } else { 1 };

    while !completed {
        let mut tally: u8 = 0;
        while tally < window_size {
            let frame = transport.recv(BLOCK)?.expect("BLOCK recv always yields a frame or errors");
            tally += 1;

            if skip {
                continue;
            }

            let ty = match frame.message_type() {
                Some(ty) => ty,
                None => {
                    outbound_reply = Some(Frame::encode(MessageType::Nack, expected_index, &[])?);
                    skip = true;
                    continue;
                }
            };

            match ty {
                MessageType::Data => {
                    if frame.index() == expected_index {
                        let payload = frame.payload();
                        sink.write_all(&payload)?;
                        bytes_received += payload.len() as u64;
                        expected_index = (expected_index + 1) % MAX_INDEX;
                        outbound_reply = Some(Frame::encode(MessageType::Ack, 0, &[])?);
                    } else {
                        outbound_reply = Some(Frame::encode(MessageType::Nack, expected_index, &[])?);
                        skip = true;
                    }
                }
                MessageType::Show => {
                    if frame.index() == expected_index {
                        let payload = frame.payload();
                        let name = String::from_utf8_lossy(&payload);
                        writeln!(sink, "\x1b[31m- {name}\x1b[0m")?;
                        bytes_received += payload.len() as u64;
                        expected_index = (expected_index + 1) % MAX_INDEX;
                        outbound_reply = Some(Frame::encode(MessageType::Ack, 0, &[])?);
                    } else {
                        outbound_reply = Some(Frame::encode(MessageType::Nack, expected_index, &[])?);
                        skip = true;
                    }
                }
                MessageType::Descriptor => {
                    if frame.index() == expected_index {
                        outbound_reply = Some(Frame::encode(MessageType::Ack, 0, &[])?);
                    } else {
                        outbound_reply = Some(Frame::encode(MessageType::Nack, expected_index, &[])?);
                        skip = true;
                    }
                }
                MessageType::End => {
                    completed = true;
                    transport.send(&Frame::encode(MessageType::Ack, 0, &[])?)?;
                    break;
                }
                _ => {
                    outbound_reply = Some(Frame::encode(MessageType::Nack, expected_index, &[])?);
                    skip = true;
                }
            }
        }

        if completed {
            break;
        }

        if let Some(reply) = outbound_reply.take() {
            transport.send(&reply)?;
        }
        skip = false;
    }

    debug!("requester session completed: {bytes_received} bytes received");
    Ok(Outcome::Completed)
}

/// The requester's single scratch destination: a newly created file
/// for DOWNLOAD, or the caller's listing writer for LS.
enum Sink<'a> {
    File(std::fs::File),
    Listing(&'a mut dyn Write),
}

impl Write for Sink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::File(f) => f.write(buf),
            Sink::Listing(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::File(f) => f.flush(),
            Sink::Listing(w) => w.flush(),
        }
    }
}

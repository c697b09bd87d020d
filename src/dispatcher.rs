//! Session dispatcher (component C7, SPEC_FULL.md §4.7): the one-shot
//! requester wrapper and the responder's accept loop.
//!
//! Grounded on `original_source/client/src/main.c`'s `main` (the opening
//! retry loop that precedes `process_context`) and
//! `original_source/server/src/main.c`'s `main` (the `for(;;)` accept
//! loop around `pkgrecv`/`context_init`/`process_context`).

use std::io::Write;

use log::{debug, info, trace};

use crate::config::Config;
use crate::error::{RequesterError, ResponderError};
use crate::frame::Frame;
use crate::requester::{self, Outcome, Request};
use crate::responder;
use crate::transport::{FrameTransport, BLOCK};

/// Runs a single requester session to completion and returns its
/// outcome. Owns nothing beyond the call: the transport, config, and
/// listing sink are all borrowed from the caller, matching
/// `main.c`'s flat, single-session lifetime (create context, run it,
/// free it, exit).
pub fn run_requester(
    request: Request,
    transport: &mut dyn FrameTransport,
    config: &Config,
    listing_out: &mut dyn Write,
) -> Result<Outcome, RequesterError> {
    let is_download = matches!(request, Request::Download(_));
    let outcome = requester::start(request, transport, config, listing_out)?;
    match &outcome {
        Outcome::Completed if is_download => info!("download completed"),
        Outcome::Completed => info!("listing completed"),
        Outcome::RemoteError(message) => info!("responder rejected the request: {message}"),
    }
    Ok(outcome)
}

/// Runs the responder's accept loop forever: blocks for the next frame,
/// serves it if it is a session opener (LS or DOWNLOAD), and silently
/// ignores everything else — a frame from no open session, or a
/// CRC-invalid buffer the transport has already discarded.
///
/// Mirrors `server/src/main.c`'s `for(;;) { pkgrecv(...); if (iscontext)
/// ... }`: one session is served fully before the loop blocks again, so
/// a second requester's frames are ignored until the current transfer
/// ends (spec.md §5).
pub fn run_responder_forever(transport: &mut dyn FrameTransport, config: &Config) -> ! {
    loop {
        match transport.recv(BLOCK) {
            Ok(Some(frame)) => dispatch_one(&frame, transport, config),
            Ok(None) => unreachable!("BLOCK recv never returns None"),
            Err(e) => trace!("accept loop recv error, continuing: {e}"),
        }
    }
}

fn dispatch_one(frame: &Frame, transport: &mut dyn FrameTransport, config: &Config) {
    let Some(ty) = frame.message_type() else {
        return;
    };
    if !ty.is_session_opener() {
        trace!("ignoring non-opener frame (type 0x{:02x}) with no open session", ty.code());
        return;
    }
    debug!("session opened (type 0x{:02x})", ty.code());
    if let Err(e) = serve_one_logged(frame, transport, config) {
        trace!("session ended with a transport error: {e}");
    }
    debug!("session closed");
}

fn serve_one_logged(frame: &Frame, transport: &mut dyn FrameTransport, config: &Config) -> Result<(), ResponderError> {
    responder::serve_one(frame, transport, config)
}

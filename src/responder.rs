//! Responder session state machine (component C6, SPEC_FULL.md §4.6).
//!
//! Grounded on `original_source/server/src/context.c`
//! (`context_init_download`/`context_init_ls`, `context_update_with_ack`,
//! `context_update_with_nack`, `find_nack_pkg`) and `server/src/main.c`
//! (`process_context_end`'s bounded finalization retry). Where the window
//! empties out after a refill the session moves straight to finalization
//! rather than sending an empty window and waiting out a full timeout —
//! this keeps the S1/S2/S3 wire traces exact without special-casing LS
//! against DOWNLOAD (see DESIGN.md).

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};

use log::{debug, trace, warn};

use crate::assets;
use crate::config::Config;
use crate::error::ResponderError;
use crate::frame::{self, Frame, MAX_INDEX, ReadOutcome};
use crate::message::MessageType;
use crate::transport::FrameTransport;

const INVALID_OPERATION: &[u8] = b"Invalid Operation";

enum Source {
    File(File),
    Listing { entries: Vec<OsString>, pos: usize },
}

impl Source {
    /// Produces the next window-slot frame from this source, if any, and
    /// whether the source was exhausted producing it.
    fn next_frame(&mut self, index: u8) -> io::Result<(Option<Frame>, bool)> {
        match self {
            Source::File(file) => {
                let (chunk, outcome) = frame::read_chunk_from(file)?;
                let eof = matches!(outcome, ReadOutcome::Eof);
                if chunk.size() == 0 && eof {
                    Ok((None, true))
                } else {
                    Ok((Some(chunk.into_frame(MessageType::Data, index)), eof))
                }
            }
            Source::Listing { entries, pos } => {
                if *pos >= entries.len() {
                    return Ok((None, true));
                }
                let name = entries[*pos].to_string_lossy().into_owned();
                *pos += 1;
                let eof = *pos >= entries.len();
                let frame = Frame::encode(MessageType::Show, index, name.as_bytes())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok((Some(frame), eof))
            }
        }
    }
}

struct Session<'a> {
    transport: &'a mut dyn FrameTransport,
    config: &'a Config,
    /// How many frames this session keeps in flight at once: the full
    /// sliding window for DOWNLOAD, but a stop-and-wait width of 1 for LS
    /// (the requester only ever tallies one SHOW per round; see
    /// requester::start's `window_size`).
    window_size: u8,
    window: Vec<Frame>,
    next_index: u8,
    end: bool,
    source: Source,
}

impl<'a> Session<'a> {
    fn refill(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            if self.end {
                break;
            }
            match self.source.next_frame(self.next_index)? {
                (Some(frame), eof) => {
                    self.window.push(frame);
                    self.next_index = (self.next_index + 1) % MAX_INDEX;
                    if eof {
                        self.end = true;
                    }
                }
                (None, _) => {
                    self.end = true;
                    break;
                }
            }
        }
        Ok(())
    }

    fn send_window(&mut self) -> Result<(), ResponderError> {
        for frame in &self.window {
            self.transport.send(frame)?;
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), ResponderError> {
        self.window.clear();
        self.refill(self.window_size as usize)?;
        Ok(())
    }

    fn handle_nack(&mut self, index: u8) -> Result<(), ResponderError> {
        match self.window.iter().position(|f| f.index() == index) {
            Some(p) => {
                if p > 0 {
                    self.window.drain(0..p);
                }
                if !self.end {
                    let to_fill = self.window_size as usize - self.window.len();
                    self.refill(to_fill)?;
                }
            }
            None if self.end => {
                // The requester has advanced past the last frame we sent.
                self.window.clear();
            }
            None => {
                warn!("NACK for index {index} not in the current window; resending it unchanged");
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ResponderError> {
        let end_frame = Frame::encode(MessageType::End, 0, &[])?;
        for attempt in 0..self.config.finalize_retries {
            self.transport.send(&end_frame)?;
            match self.transport.recv(self.config.reply_timeout)? {
                Some(reply) if reply.message_type() == Some(MessageType::Ack) => {
                    debug!("finalization acked on attempt {attempt}");
                    return Ok(());
                }
                _ => trace!("finalization attempt {attempt} drew no ACK, retrying"),
            }
        }
        warn!(
            "finalization gave up after {} attempts with no ACK",
            self.config.finalize_retries
        );
        Ok(())
    }

    fn run(&mut self) -> Result<(), ResponderError> {
        loop {
            if self.window.is_empty() {
                return self.finalize();
            }
            self.send_window()?;
            match self.transport.recv(self.config.reply_timeout)? {
                None => trace!("serve round timed out, resending window"),
                Some(reply) => match reply.message_type() {
                    Some(MessageType::Ack) => self.advance()?,
                    Some(MessageType::Nack) => self.handle_nack(reply.index())?,
                    _ => trace!("unexpected reply during serve loop, resending window"),
                },
            }
        }
    }
}

/// Serves exactly one session, dispatching on `initial_request`'s type.
/// Returns once the transfer completes or the responder gives up on
/// finalization; transport failures are the only error path, matching
/// `serve_one`'s "asset errors become an ERROR frame, not a `Result::Err`"
/// policy (see DESIGN.md's resolution of the `pkgsend_error` mismatch).
pub fn serve_one(
    initial_request: &Frame,
    transport: &mut dyn FrameTransport,
    config: &Config,
) -> Result<(), ResponderError> {
    match initial_request.message_type() {
        Some(MessageType::Download) => serve_download(initial_request, transport, config),
        Some(MessageType::Ls) => serve_ls(transport, config),
        _ => Ok(()),
    }
}

fn serve_download(
    initial_request: &Frame,
    transport: &mut dyn FrameTransport,
    config: &Config,
) -> Result<(), ResponderError> {
    let payload = initial_request.payload();
    let name = String::from_utf8_lossy(&payload);

    let file = assets::resolve_asset_path(&config.asset_root, &name).and_then(|path| File::open(path).ok());
    let Some(mut file) = file else {
        warn!("download request for {name:?} could not be opened");
        transport.send(&Frame::encode(MessageType::Error, 0, INVALID_OPERATION)?)?;
        return Ok(());
    };

    let size = file_len(&mut file)?;
    let descriptor = Frame::encode(MessageType::Descriptor, 0, &size.to_le_bytes())?;
    debug!("serving download of {name:?}, {size} bytes");

    let mut session = Session {
        transport,
        config,
        window_size: config.window_size,
        window: vec![descriptor],
        next_index: 1,
        end: false,
        source: Source::File(file),
    };
    session.run()
}

fn serve_ls(transport: &mut dyn FrameTransport, config: &Config) -> Result<(), ResponderError> {
    let entries = match assets::list_asset_entries(&config.asset_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("could not list asset directory: {e}");
            transport.send(&Frame::encode(MessageType::Error, 0, INVALID_OPERATION)?)?;
            return Ok(());
        }
    };
    debug!("serving listing of {} entries", entries.len());
    transport.send(&Frame::encode(MessageType::Ack, 0, &[])?)?;

    let mut session = Session {
        transport,
        config,
        window_size: 1,
        window: Vec::new(),
        next_index: 0,
        end: false,
        source: Source::Listing { entries, pos: 0 },
    };
    session.refill(1)?;
    session.run()
}

fn file_len(file: &mut File) -> io::Result<u64> {
    let metadata = file.metadata()?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Write;

    struct ScriptedTransport {
        inbound: VecDeque<Frame>,
        sent: Vec<Frame>,
    }

    impl ScriptedTransport {
        fn new(inbound: Vec<Frame>) -> Self {
            ScriptedTransport { inbound: inbound.into(), sent: Vec::new() }
        }
    }

    impl FrameTransport for ScriptedTransport {
        fn send(&mut self, frame: &Frame) -> Result<(), crate::error::TransportError> {
            self.sent.push(*frame);
            Ok(())
        }
        fn recv(&mut self, _timeout: std::time::Duration) -> Result<Option<Frame>, crate::error::TransportError> {
            Ok(self.inbound.pop_front())
        }
    }

    fn config_with_root(root: std::path::PathBuf) -> Config {
        Config { asset_root: root, ..Config::default() }
    }

    #[test]
    fn empty_ls_sends_ack_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_root(dir.path().to_path_buf());
        let mut transport = ScriptedTransport::new(vec![Frame::encode(MessageType::Ack, 0, &[]).unwrap()]);
        let request = Frame::encode(MessageType::Ls, 0, &[]).unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let types: Vec<_> = transport.sent.iter().map(|f| f.message_type()).collect();
        assert_eq!(types, vec![Some(MessageType::Ack), Some(MessageType::End)]);
    }

    #[test]
    fn ls_with_one_entry_sends_ack_show_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"x").unwrap();
        let config = config_with_root(dir.path().to_path_buf());
        let mut transport = ScriptedTransport::new(vec![
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
        ]);
        let request = Frame::encode(MessageType::Ls, 0, &[]).unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let types: Vec<_> = transport.sent.iter().map(|f| f.message_type()).collect();
        assert_eq!(
            types,
            vec![Some(MessageType::Ack), Some(MessageType::Show), Some(MessageType::End)]
        );
        assert_eq!(transport.sent[1].payload(), b"a.bin");
        assert_eq!(transport.sent[1].index(), 0);
    }

    #[test]
    fn ls_with_several_entries_sends_one_show_per_ack() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"x").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"y").unwrap();
        std::fs::write(dir.path().join("c.bin"), b"z").unwrap();
        let config = config_with_root(dir.path().to_path_buf());
        let mut transport = ScriptedTransport::new(vec![
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(), // for the opening ACK
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(), // for SHOW(a.bin)
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(), // for SHOW(b.bin)
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(), // for SHOW(c.bin)
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(), // for END
        ]);
        let request = Frame::encode(MessageType::Ls, 0, &[]).unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let shows: Vec<_> = transport
            .sent
            .iter()
            .filter(|f| f.message_type() == Some(MessageType::Show))
            .collect();
        assert_eq!(shows.len(), 3, "every entry must be sent, one at a time");
        assert_eq!(shows[0].payload(), b"a.bin");
        assert_eq!(shows[1].payload(), b"b.bin");
        assert_eq!(shows[2].payload(), b"c.bin");
        assert_eq!(transport.sent.last().unwrap().message_type(), Some(MessageType::End));
    }

    #[test]
    fn download_one_byte_sends_descriptor_then_data_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("f")).unwrap();
        f.write_all(&[0x41]).unwrap();
        drop(f);
        let config = config_with_root(dir.path().to_path_buf());
        let mut transport = ScriptedTransport::new(vec![
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
        ]);
        let request = Frame::encode(MessageType::Download, 0, b"f").unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let types: Vec<_> = transport.sent.iter().map(|f| f.message_type()).collect();
        assert_eq!(
            types,
            vec![Some(MessageType::Descriptor), Some(MessageType::Data), Some(MessageType::End)]
        );
        assert_eq!(transport.sent[0].payload(), 1u64.to_le_bytes());
        assert_eq!(transport.sent[1].index(), 1);
        assert_eq!(transport.sent[1].payload(), vec![0x41]);
    }

    #[test]
    fn missing_asset_sends_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_root(dir.path().to_path_buf());
        let mut transport = ScriptedTransport::new(vec![]);
        let request = Frame::encode(MessageType::Download, 0, b"nope").unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].message_type(), Some(MessageType::Error));
        assert_eq!(transport.sent[0].payload(), INVALID_OPERATION);
    }

    #[test]
    fn nack_for_buffered_index_resends_without_advancing() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("f")).unwrap();
        f.write_all(&[1, 2, 3]).unwrap();
        drop(f);
        let config = config_with_root(dir.path().to_path_buf());
        // descriptor(idx0) -> ACK -> data(idx1) -> NACK(1) -> data(idx1) again -> ACK -> end -> ACK
        let mut transport = ScriptedTransport::new(vec![
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
            Frame::encode(MessageType::Nack, 1, &[]).unwrap(),
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
            Frame::encode(MessageType::Ack, 0, &[]).unwrap(),
        ]);
        let request = Frame::encode(MessageType::Download, 0, b"f").unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let data_frames: Vec<_> = transport
            .sent
            .iter()
            .filter(|f| f.message_type() == Some(MessageType::Data))
            .collect();
        assert_eq!(data_frames.len(), 2);
        assert_eq!(data_frames[0].payload(), data_frames[1].payload());
    }

    #[test]
    fn finalization_gives_up_after_bounded_retries() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_root(dir.path().to_path_buf());
        // No queued replies at all: every finalization attempt times out,
        // so the loop must run all `finalize_retries` attempts and give up.
        let mut transport = ScriptedTransport::new(vec![]);
        let request = Frame::encode(MessageType::Ls, 0, &[]).unwrap();
        serve_one(&request, &mut transport, &config).unwrap();
        let end_count = transport
            .sent
            .iter()
            .filter(|f| f.message_type() == Some(MessageType::End))
            .count();
        assert_eq!(end_count, config.finalize_retries as usize);
    }
}

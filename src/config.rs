//! Session configuration (SPEC_FULL.md §1.1 / Design Notes' "thread
//! through a session config" — there is no other global module state).

use std::path::PathBuf;
use std::time::Duration;

use crate::frame::MAX_INDEX;

/// Sliding window size, `W = 5` in spec.md §3. Kept well under
/// `MAX_INDEX / 2` so no two in-flight frames ever share an index.
pub const WINDOW_SIZE: u8 = 5;

/// `DELTA`, the bounded retry count for the finalization handshake.
pub const FINALIZE_RETRIES: u32 = 40;

/// `T_reply`, the responder's per-receive timeout during the serve loop
/// and finalization.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(5000);

const _: () = assert!((WINDOW_SIZE as u32) * 2 < MAX_INDEX as u32);

/// Tunable parameters threaded through session construction, built once
/// at the top of each binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub window_size: u8,
    pub reply_timeout: Duration,
    pub finalize_retries: u32,
    pub asset_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window_size: WINDOW_SIZE,
            reply_timeout: REPLY_TIMEOUT,
            finalize_retries: FINALIZE_RETRIES,
            asset_root: PathBuf::from("./assets/"),
        }
    }
}

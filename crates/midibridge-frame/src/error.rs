//! Decode outcomes that are not a finished frame.

use std::io;
use thiserror::Error;

/// Why a decode step reset the frame under construction.
///
/// None of these are fatal to the decoder itself. `Io` means the byte source
/// is gone and the housekeeping side should close and reopen the device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("byte source lost: {0}")]
    Io(io::ErrorKind),

    /// Running-status parity mismatch or an invalid leading byte.
    #[error("malformed MIDI frame")]
    Malformed,

    /// The frame hit its byte capacity without completing.
    #[error("MIDI frame exceeds capacity")]
    Overflow,
}

impl FrameError {
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::Io(_))
    }
}

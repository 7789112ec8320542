//! Byte-stream framing for serial MIDI.
//!
//! Turns an unstructured stream of MIDI bytes into complete messages and
//! buffers them for a consumer that runs on a different schedule.
//!
//! # Features
//!
//! - **Decoder**: running status, SysEx, realtime and system common framing
//! - **Post-processing**: status skip list, running-status expansion, frame dump
//! - **Queue**: fixed-capacity, preallocated FIFO of finished frames
//!
//! # Example
//!
//! ```
//! use midibridge_frame::{decode_all, DecoderConfig};
//!
//! let config = DecoderConfig::default().expand(true);
//! let (frames, stats) = decode_all(&[0x90, 60, 100, 62, 100, 0xF8], &config);
//!
//! // The run is rewritten with explicit status bytes
//! assert_eq!(frames[0].as_bytes(), &[0x90, 60, 100, 0x90, 62, 100]);
//! assert_eq!(frames[1].as_bytes(), &[0xF8]);
//! assert_eq!(stats.malformed, 0);
//! ```

// Error types
pub mod error;
pub use error::FrameError;

pub mod config;
pub mod decoder;
pub mod frame;
pub mod post;
pub mod queue;
pub mod source;
pub mod status;

pub use config::DecoderConfig;
pub use decoder::{decode_all, DecodeStats, FrameDecoder, FrameReader, PushOutcome};
pub use frame::{Frame, HexBytes, DEFAULT_MAX_FRAME_BYTES};
pub use post::{expand_running, DumpMode, Expansion, FrameDump, PostOutcome, PostProcessor, SkipSet};
pub use queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
pub use source::{is_transient, ByteSource, RefillWindow, SliceSource, DEFAULT_REFILL_BYTES};
pub use status::{
    frame_length, is_channel_voice, is_realtime, is_status, FrameLength, RUN_DATA_BYTES,
    SYSEX_END, SYSEX_START,
};

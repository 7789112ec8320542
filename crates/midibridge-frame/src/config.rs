//! Decoder configuration.

use serde::{Deserialize, Serialize};

use crate::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::source::DEFAULT_REFILL_BYTES;

/// Settings for [`FrameDecoder`](crate::FrameDecoder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Status bytes whose frames are dropped before queuing.
    pub skip: Vec<u8>,
    /// Rewrite compact running-status runs into explicit messages.
    pub expand_running_status: bool,
    pub max_frame_bytes: usize,
    pub refill_buffer_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            expand_running_status: false,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            refill_buffer_bytes: DEFAULT_REFILL_BYTES,
        }
    }
}

impl DecoderConfig {
    pub fn with_skip(mut self, skip: impl IntoIterator<Item = u8>) -> Self {
        self.skip = skip.into_iter().collect();
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand_running_status = expand;
        self
    }

    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    pub fn refill_buffer_bytes(mut self, bytes: usize) -> Self {
        self.refill_buffer_bytes = bytes;
        self
    }
}

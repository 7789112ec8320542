//! Streaming MIDI frame decoder.
//!
//! Consumes one byte per call and reports exactly one outcome. Channel-voice
//! frames accumulate under running status (`90 3c 64 3e 64 ...`) until the
//! next status byte arrives; that byte is pushed back and starts the next
//! frame. System exclusive frames end only on an explicit `F7`, every other
//! frame at the length given by the status table.

use std::io::Write;

use crate::config::DecoderConfig;
use crate::error::FrameError;
use crate::frame::Frame;
use crate::post::{DumpMode, FrameDump, PostOutcome, PostProcessor, SkipSet};
use crate::source::{ByteSource, RefillWindow, SliceSource};
use crate::status::{
    frame_length, is_channel_voice, is_status, FrameLength, RUN_DATA_BYTES, SYSEX_END,
};

/// Result of one [`FrameDecoder::push_byte`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Source had nothing to offer. Not an error.
    NoByte,
    /// Byte appended, frame not complete yet.
    Next,
    /// Frame is complete and post-processed.
    Complete,
    /// Frame was complete but matched the skip set; it has been reset.
    Skipped,
    /// Frame was reset. Only `FrameError::Io` requires action from the caller.
    Error(FrameError),
}

impl PushOutcome {
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, PushOutcome::Complete)
    }
}

/// Byte-at-a-time decoder state: refill window, push-back slot, running
/// status and the post-processor.
#[derive(Debug)]
pub struct FrameDecoder {
    window: RefillWindow,
    push_back: Option<u8>,
    running: Option<u8>,
    post: PostProcessor,
}

impl FrameDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            window: RefillWindow::new(config.refill_buffer_bytes),
            push_back: None,
            running: None,
            post: PostProcessor::new(
                SkipSet::from_bytes(&config.skip),
                config.expand_running_status,
            ),
        }
    }

    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running
    }

    #[inline]
    pub fn has_push_back(&self) -> bool {
        self.push_back.is_some()
    }

    pub fn post_processor(&self) -> &PostProcessor {
        &self.post
    }

    /// Route every kept frame to `sink` as well.
    pub fn attach_dump(&mut self, sink: Box<dyn Write + Send>, mode: DumpMode) {
        self.post.set_dump(Some(FrameDump::new(sink, mode)));
    }

    pub fn detach_dump(&mut self) {
        self.post.set_dump(None);
    }

    /// Forget everything tied to the current byte stream. Called when the
    /// device is closed or replaced.
    pub fn reset_stream(&mut self) {
        self.push_back = None;
        self.running = None;
        self.window.clear();
    }

    fn next_byte<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<u8>, FrameError> {
        if let Some(byte) = self.push_back.take() {
            return Ok(Some(byte));
        }
        self.window
            .next_byte(source)
            .map_err(|e| FrameError::Io(e.kind()))
    }

    /// Read one byte from `source` (or the push-back slot) into `frame`.
    pub fn push_byte<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        frame: &mut Frame,
    ) -> PushOutcome {
        let byte = match self.next_byte(source) {
            Ok(Some(byte)) => byte,
            Ok(None) => return PushOutcome::NoByte,
            Err(e) => return PushOutcome::Error(e),
        };

        if self.running.is_some() && is_status(byte) {
            // Start of the next message ends the running-status run.
            self.push_back = Some(byte);
            self.running = None;
            if is_whole_run(frame) {
                return self.finish(frame);
            }
            frame.reset();
            return PushOutcome::Error(FrameError::Malformed);
        }

        if frame.is_full() {
            // Leave the byte for the next frame, like an unread byte.
            if !frame.is_empty() {
                self.push_back = Some(byte);
            }
            frame.reset();
            self.running = None;
            return PushOutcome::Error(FrameError::Overflow);
        }

        if frame.is_empty() {
            match self.running {
                // Implicit status carried over from the previous message.
                Some(status) if !is_status(byte) => {
                    frame.push(status);
                }
                _ => {
                    self.running = is_channel_voice(byte).then_some(byte);
                }
            }
            if frame.is_full() {
                frame.reset();
                self.running = None;
                return PushOutcome::Error(FrameError::Overflow);
            }
        }

        frame.push(byte);

        let Some(status) = frame.status() else {
            return PushOutcome::Next;
        };
        match frame_length(status) {
            FrameLength::Invalid => {
                self.running = None;
                frame.reset();
                PushOutcome::Error(FrameError::Malformed)
            }
            FrameLength::SysEx => {
                if frame.len() > 1 && byte == SYSEX_END {
                    self.finish(frame)
                } else {
                    PushOutcome::Next
                }
            }
            FrameLength::Fixed(n) => {
                if self.running.is_none() && frame.len() == n as usize {
                    self.finish(frame)
                } else {
                    PushOutcome::Next
                }
            }
        }
    }

    fn finish(&mut self, frame: &mut Frame) -> PushOutcome {
        match self.post.process(frame) {
            PostOutcome::Keep => PushOutcome::Complete,
            PostOutcome::Skip => {
                frame.reset();
                PushOutcome::Skipped
            }
        }
    }
}

/// A running-status run may only end on a message boundary: a non-zero,
/// even number of data bytes, whatever the channel-voice status.
fn is_whole_run(frame: &Frame) -> bool {
    match frame.status() {
        Some(status) if is_channel_voice(status) => {
            frame.data_len() > 0 && frame.data_len() % RUN_DATA_BYTES == 0
        }
        _ => false,
    }
}

/// Outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub complete: u64,
    pub skipped: u64,
    pub malformed: u64,
    pub overflow: u64,
    pub io_errors: u64,
}

impl DecodeStats {
    pub fn record(&mut self, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Complete => self.complete += 1,
            PushOutcome::Skipped => self.skipped += 1,
            PushOutcome::Error(FrameError::Malformed) => self.malformed += 1,
            PushOutcome::Error(FrameError::Overflow) => self.overflow += 1,
            PushOutcome::Error(FrameError::Io(_)) => self.io_errors += 1,
            PushOutcome::NoByte | PushOutcome::Next => {}
        }
    }
}

/// Decoder paired with a preallocated scratch frame.
///
/// After [`read_one`](Self::read_one) returns `Complete`, [`frame`](Self::frame)
/// holds the finished frame until the next call.
#[derive(Debug)]
pub struct FrameReader {
    decoder: FrameDecoder,
    frame: Frame,
    completed: bool,
    stats: DecodeStats,
}

impl FrameReader {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config),
            frame: Frame::with_capacity(config.max_frame_bytes),
            completed: false,
            stats: DecodeStats::default(),
        }
    }

    pub fn read_one<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> PushOutcome {
        if self.completed {
            self.frame.reset();
            self.completed = false;
        }
        let outcome = self.decoder.push_byte(source, &mut self.frame);
        self.stats.record(outcome);
        self.completed = outcome.is_complete();
        outcome
    }

    /// Last completed frame. Empty while a frame is still being built.
    pub fn frame(&self) -> Option<&Frame> {
        self.completed.then_some(&self.frame)
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut FrameDecoder {
        &mut self.decoder
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Drop the partial frame and all per-stream decoder state.
    pub fn reset_stream(&mut self) {
        self.decoder.reset_stream();
        self.frame.reset();
        self.completed = false;
    }
}

/// Decode a captured byte stream in one go.
///
/// A channel-voice run at the very end stays pending, as it would on a live
/// stream until the next status byte.
pub fn decode_all(bytes: &[u8], config: &DecoderConfig) -> (Vec<Frame>, DecodeStats) {
    let mut source = SliceSource::new(bytes);
    let mut reader = FrameReader::new(config);
    let mut frames = Vec::new();
    loop {
        match reader.read_one(&mut source) {
            PushOutcome::NoByte | PushOutcome::Error(FrameError::Io(_)) => break,
            PushOutcome::Complete => {
                if let Some(frame) = reader.frame() {
                    frames.push(frame.clone());
                }
            }
            _ => {}
        }
    }
    (frames, reader.stats())
}

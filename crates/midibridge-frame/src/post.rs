//! Per-frame post-processing: skip filter, running-status expansion, dump.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::status::{is_channel_voice, RUN_DATA_BYTES};

/// Set of status bytes whose frames are discarded before queuing.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipSet {
    bits: [u64; 4],
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut set = Self::new();
        for &b in bytes {
            set.insert(b);
        }
        set
    }

    #[inline]
    pub fn insert(&mut self, status: u8) {
        self.bits[(status >> 6) as usize] |= 1 << (status & 63);
    }

    #[inline]
    pub fn contains(&self, status: u8) -> bool {
        self.bits[(status >> 6) as usize] & (1 << (status & 63)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(|&b| self.contains(b))
    }
}

impl fmt::Debug for SkipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|b| format!("{:#04x}", b)))
            .finish()
    }
}

/// Result of [`expand_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// Not a compact running-status run; left as is.
    Unchanged,
    /// Rewritten into this many explicit messages.
    Expanded(usize),
    /// Expanded form would not fit the frame; compact form kept.
    TooLarge,
}

/// Rewrites a compact running-status run (`90 a b c d`) into explicit
/// messages (`90 a b 90 c d`) in place.
///
/// Data bytes are always taken in pairs, so `c0 1 2 3 4` becomes
/// `c0 1 2 c0 3 4`. Frames already holding a single message, non
/// channel-voice frames, and runs with an odd data count are left untouched.
pub fn expand_running(frame: &mut Frame) -> Expansion {
    let status = match frame.status() {
        Some(status) if is_channel_voice(status) => status,
        _ => return Expansion::Unchanged,
    };
    let per_msg = RUN_DATA_BYTES;
    let data_len = frame.data_len();
    if data_len <= per_msg || data_len % per_msg != 0 {
        return Expansion::Unchanged;
    }

    let count = data_len / per_msg;
    let expanded_len = count * (per_msg + 1);
    if expanded_len > frame.capacity() {
        return Expansion::TooLarge;
    }

    // Back to front, so each message lands at or after the bytes it still
    // has to read.
    let buf = frame.storage_mut();
    for i in (0..count).rev() {
        let src = 1 + i * per_msg;
        let dst = i * (per_msg + 1);
        buf.copy_within(src..src + per_msg, dst + 1);
        buf[dst] = status;
    }
    frame.set_len(expanded_len);
    Expansion::Expanded(count)
}

/// Dump encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpMode {
    /// One line of two-digit hex bytes per frame.
    #[default]
    Hex,
    /// Frame bytes verbatim.
    Raw,
}

/// Diagnostic side channel receiving every queued frame.
///
/// Write failures are swallowed; a broken dump never stalls decoding.
pub struct FrameDump {
    sink: Box<dyn Write + Send>,
    mode: DumpMode,
    failed: bool,
}

impl FrameDump {
    pub fn new(sink: Box<dyn Write + Send>, mode: DumpMode) -> Self {
        Self {
            sink,
            mode,
            failed: false,
        }
    }

    #[inline]
    pub fn mode(&self) -> DumpMode {
        self.mode
    }

    pub fn write_frame(&mut self, frame: &Frame) {
        let result = match self.mode {
            DumpMode::Hex => writeln!(self.sink, "{}", frame.hex()),
            DumpMode::Raw => self.sink.write_all(frame.as_bytes()),
        };
        if let Err(e) = result {
            if !self.failed {
                tracing::debug!("Frame dump write failed, ignoring: {}", e);
                self.failed = true;
            }
        }
    }
}

impl fmt::Debug for FrameDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDump")
            .field("mode", &self.mode)
            .field("failed", &self.failed)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Keep,
    Skip,
}

/// Applied once to every structurally complete frame: skip, expand, dump.
#[derive(Debug, Default)]
pub struct PostProcessor {
    skip: SkipSet,
    expand: bool,
    dump: Option<FrameDump>,
}

impl PostProcessor {
    pub fn new(skip: SkipSet, expand: bool) -> Self {
        Self {
            skip,
            expand,
            dump: None,
        }
    }

    pub fn skip_set(&self) -> &SkipSet {
        &self.skip
    }

    pub fn expands(&self) -> bool {
        self.expand
    }

    pub fn set_dump(&mut self, dump: Option<FrameDump>) {
        self.dump = dump;
    }

    pub fn dump_mode(&self) -> Option<DumpMode> {
        self.dump.as_ref().map(FrameDump::mode)
    }

    pub fn process(&mut self, frame: &mut Frame) -> PostOutcome {
        if let Some(status) = frame.status() {
            if self.skip.contains(status) {
                tracing::trace!("Skipped frame [{}]", frame.hex());
                return PostOutcome::Skip;
            }
        }

        if self.expand && expand_running(frame) == Expansion::TooLarge {
            tracing::debug!(
                "Running-status run of {} bytes too large to expand, kept compact",
                frame.len()
            );
        }

        if let Some(dump) = self.dump.as_mut() {
            dump.write_frame(frame);
        }

        tracing::trace!("Read frame [{}]", frame.hex());
        PostOutcome::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Cloneable in-memory sink so tests can inspect what was dumped.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_slice(bytes, 16).unwrap()
    }

    #[test]
    fn test_skip_set_membership() {
        let set = SkipSet::from_bytes(&[0xF8, 0xFE, 0x00, 0x7F]);
        assert_eq!(set.len(), 4);
        assert!(set.contains(0xF8));
        assert!(set.contains(0xFE));
        assert!(set.contains(0x00));
        assert!(set.contains(0x7F));
        assert!(!set.contains(0x90));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0x00, 0x7F, 0xF8, 0xFE]);
        assert!(SkipSet::new().is_empty());
    }

    #[test]
    fn test_expand_note_run() {
        let mut f = frame(&[0x90, 60, 100, 62, 100, 64, 0]);
        assert_eq!(expand_running(&mut f), Expansion::Expanded(3));
        assert_eq!(
            f.as_bytes(),
            &[0x90, 60, 100, 0x90, 62, 100, 0x90, 64, 0]
        );
    }

    #[test]
    fn test_expand_program_change_run_in_pairs() {
        let mut f = frame(&[0xC3, 1, 2, 3, 4]);
        assert_eq!(expand_running(&mut f), Expansion::Expanded(2));
        assert_eq!(f.as_bytes(), &[0xC3, 1, 2, 0xC3, 3, 4]);

        let mut odd = frame(&[0xD0, 1, 2, 3]);
        assert_eq!(expand_running(&mut odd), Expansion::Unchanged);
        assert_eq!(odd.as_bytes(), &[0xD0, 1, 2, 3]);
    }

    #[test]
    fn test_expand_leaves_single_and_system_frames() {
        let mut single = frame(&[0x90, 60, 100]);
        assert_eq!(expand_running(&mut single), Expansion::Unchanged);
        assert_eq!(single.as_bytes(), &[0x90, 60, 100]);

        let mut sysex = frame(&[0xF0, 1, 2, 3, 4, 0xF7]);
        assert_eq!(expand_running(&mut sysex), Expansion::Unchanged);

        let mut odd = frame(&[0x90, 60, 100, 62]);
        assert_eq!(expand_running(&mut odd), Expansion::Unchanged);
        assert_eq!(odd.as_bytes(), &[0x90, 60, 100, 62]);

        let mut empty = Frame::with_capacity(4);
        assert_eq!(expand_running(&mut empty), Expansion::Unchanged);
    }

    #[test]
    fn test_expand_too_large_keeps_compact() {
        // 1 + 2*3 = 7 bytes compact, 9 expanded
        let mut f = Frame::from_slice(&[0xB0, 1, 2, 3, 4, 5, 6], 8).unwrap();
        assert_eq!(expand_running(&mut f), Expansion::TooLarge);
        assert_eq!(f.as_bytes(), &[0xB0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_hex_dump_lines() {
        let buf = SharedBuf::default();
        let mut dump = FrameDump::new(Box::new(buf.clone()), DumpMode::Hex);
        dump.write_frame(&frame(&[0x90, 0x3C, 0x64]));
        dump.write_frame(&frame(&[0xF8]));

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        insta::assert_snapshot!(text.trim_end(), @r"
        90 3c 64
        f8
        ");
    }

    #[test]
    fn test_raw_dump_is_verbatim() {
        let buf = SharedBuf::default();
        let mut dump = FrameDump::new(Box::new(buf.clone()), DumpMode::Raw);
        dump.write_frame(&frame(&[0xF0, 0x7E, 0xF7]));
        dump.write_frame(&frame(&[0xC0, 5]));
        assert_eq!(*buf.0.lock().unwrap(), vec![0xF0, 0x7E, 0xF7, 0xC0, 5]);
    }

    #[test]
    fn test_broken_dump_does_not_stop_processing() {
        let mut post = PostProcessor::new(SkipSet::new(), false);
        post.set_dump(Some(FrameDump::new(Box::new(BrokenSink), DumpMode::Hex)));

        let mut f = frame(&[0x80, 60, 0]);
        assert_eq!(post.process(&mut f), PostOutcome::Keep);
        assert_eq!(post.process(&mut f), PostOutcome::Keep);
    }

    #[test]
    fn test_process_order_skip_before_expand() {
        let buf = SharedBuf::default();
        let mut post = PostProcessor::new(SkipSet::from_bytes(&[0xFE]), true);
        post.set_dump(Some(FrameDump::new(Box::new(buf.clone()), DumpMode::Raw)));

        let mut sensing = frame(&[0xFE]);
        assert_eq!(post.process(&mut sensing), PostOutcome::Skip);

        let mut run = frame(&[0x90, 60, 1, 61, 2]);
        assert_eq!(post.process(&mut run), PostOutcome::Keep);
        assert_eq!(run.as_bytes(), &[0x90, 60, 1, 0x90, 61, 2]);

        // Dump sees the expanded frame, never the skipped one
        assert_eq!(*buf.0.lock().unwrap(), vec![0x90, 60, 1, 0x90, 61, 2]);
    }
}

//! Expected frame length per leading status byte.

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Length rule attached to a leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// Data byte (0x00-0x7F) in leading position.
    Invalid,
    /// Complete once the frame holds this many bytes.
    Fixed(u8),
    /// Complete only on an explicit 0xF7.
    SysEx,
}

const fn length_of(status: usize) -> FrameLength {
    match status {
        0x00..=0x7F => FrameLength::Invalid,
        // note off/on, poly aftertouch, control change
        0x80..=0xBF => FrameLength::Fixed(3),
        // program change, channel pressure
        0xC0..=0xDF => FrameLength::Fixed(2),
        // pitch bend
        0xE0..=0xEF => FrameLength::Fixed(3),
        0xF0 => FrameLength::SysEx,
        0xF1 | 0xF3 => FrameLength::Fixed(2),
        0xF2 => FrameLength::Fixed(3),
        // tune request, EOX, undefined, system real-time
        _ => FrameLength::Fixed(1),
    }
}

const fn build_table() -> [FrameLength; 256] {
    let mut table = [FrameLength::Invalid; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = length_of(i);
        i += 1;
    }
    table
}

pub const STATUS_LENGTHS: [FrameLength; 256] = build_table();

#[inline]
pub fn frame_length(status: u8) -> FrameLength {
    STATUS_LENGTHS[status as usize]
}

#[inline]
pub fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// 0x80-0xEF: the statuses that establish running status.
#[inline]
pub fn is_channel_voice(byte: u8) -> bool {
    (0x80..=0xEF).contains(&byte)
}

#[inline]
pub fn is_realtime(byte: u8) -> bool {
    byte >= 0xF8
}

/// Data bytes per message inside a running-status run.
///
/// Runs are split into pairs for every channel-voice status, program change
/// and channel pressure included.
pub const RUN_DATA_BYTES: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bytes_are_invalid_starts() {
        for b in 0x00..=0x7Fu8 {
            assert_eq!(frame_length(b), FrameLength::Invalid, "byte {:#04x}", b);
        }
    }

    #[test]
    fn test_channel_voice_lengths() {
        for ch in 0..16u8 {
            assert_eq!(frame_length(0x80 | ch), FrameLength::Fixed(3));
            assert_eq!(frame_length(0x90 | ch), FrameLength::Fixed(3));
            assert_eq!(frame_length(0xA0 | ch), FrameLength::Fixed(3));
            assert_eq!(frame_length(0xB0 | ch), FrameLength::Fixed(3));
            assert_eq!(frame_length(0xC0 | ch), FrameLength::Fixed(2));
            assert_eq!(frame_length(0xD0 | ch), FrameLength::Fixed(2));
            assert_eq!(frame_length(0xE0 | ch), FrameLength::Fixed(3));
        }
    }

    #[test]
    fn test_system_lengths() {
        assert_eq!(frame_length(SYSEX_START), FrameLength::SysEx);
        let common: Vec<_> = (0xF1..=0xF7).map(frame_length).collect();
        assert_eq!(
            common,
            [2, 3, 2, 1, 1, 1, 1].map(FrameLength::Fixed).to_vec()
        );
        for b in 0xF8..=0xFFu8 {
            assert_eq!(frame_length(b), FrameLength::Fixed(1));
            assert!(is_realtime(b));
        }
    }

    #[test]
    fn test_channel_voice_range() {
        assert!(is_channel_voice(0x80));
        assert!(is_channel_voice(0xC5));
        assert!(is_channel_voice(0xEF));
        assert!(!is_channel_voice(0xF0));
        assert!(!is_channel_voice(0x40));
    }
}

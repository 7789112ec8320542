//! Fixed-capacity MIDI frame storage.
//!
//! A frame is allocated once and reused: pushing never grows the buffer, and
//! copying between frames never allocates. This keeps the decode path and the
//! real-time drain free of heap traffic.

use std::fmt;

/// Default byte capacity of a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 128;

/// One MIDI message (status byte + data bytes), or a compact running-status
/// run of several messages sharing one status byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Box<[u8]>,
    len: usize,
}

impl Frame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Builds a frame holding exactly `bytes`, sized to `capacity`.
    ///
    /// Returns `None` if `bytes` does not fit.
    pub fn from_slice(bytes: &[u8], capacity: usize) -> Option<Self> {
        let mut frame = Self::with_capacity(capacity);
        if frame.set_bytes(bytes) {
            Some(frame)
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Leading byte, if any.
    #[inline]
    pub fn status(&self) -> Option<u8> {
        self.as_bytes().first().copied()
    }

    /// Number of bytes after the status byte.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.len.saturating_sub(1)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Returns `false` without writing when the frame is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Replaces the content with `bytes`. Leaves the frame untouched and
    /// returns `false` if they do not fit.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.capacity() {
            return false;
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
        true
    }

    /// Copies `other` into this frame's storage.
    #[inline]
    pub fn copy_from(&mut self, other: &Frame) -> bool {
        self.set_bytes(other.as_bytes())
    }

    /// Full backing storage, for in-place rewrites that change the length.
    #[inline]
    pub(crate) fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.capacity());
        self.len = len;
    }

    /// Two-digit lowercase hex view, bytes separated by spaces.
    pub fn hex(&self) -> HexBytes<'_> {
        HexBytes(self.as_bytes())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}]", self.hex())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Display adapter returned by [`Frame::hex`].
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut frame = Frame::with_capacity(3);
        assert!(frame.is_empty());
        assert!(frame.push(0x90));
        assert!(frame.push(60));
        assert!(frame.push(100));
        assert!(frame.is_full());

        // Never grows
        assert!(!frame.push(1));
        assert_eq!(frame.as_bytes(), &[0x90, 60, 100]);
        assert_eq!(frame.status(), Some(0x90));
        assert_eq!(frame.data_len(), 2);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut frame = Frame::from_slice(&[0xF8], 8).unwrap();
        frame.reset();
        assert!(frame.is_empty());
        assert_eq!(frame.capacity(), 8);
        assert_eq!(frame.status(), None);
        assert_eq!(frame.data_len(), 0);
    }

    #[test]
    fn test_copy_from_respects_capacity() {
        let big = Frame::from_slice(&[0xF0, 1, 2, 3, 0xF7], 16).unwrap();
        let mut small = Frame::with_capacity(4);
        assert!(!small.copy_from(&big));
        assert!(small.is_empty());

        let mut exact = Frame::with_capacity(5);
        assert!(exact.copy_from(&big));
        assert_eq!(exact.as_bytes(), big.as_bytes());
    }

    #[test]
    fn test_hex_format() {
        let frame = Frame::from_slice(&[0x90, 0x0A, 0x7F], 8).unwrap();
        assert_eq!(frame.hex().to_string(), "90 0a 7f");
        assert_eq!(format!("{:?}", frame), "Frame[90 0a 7f]");
        assert_eq!(Frame::with_capacity(4).hex().to_string(), "");
    }
}

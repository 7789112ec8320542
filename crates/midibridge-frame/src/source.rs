//! Byte source contract and the decoder's refill window.
//!
//! The decoder never blocks: a source that has nothing to offer reports it
//! through `Ok(0)` or `WouldBlock`, both of which mean "no byte yet". Any
//! other error is a permanent loss of the device.

use std::io;

/// Default refill buffer size.
pub const DEFAULT_REFILL_BYTES: usize = 256;

/// Non-blocking producer of raw MIDI bytes.
pub trait ByteSource {
    /// `Ok(true)` if a read would return data now. An error means the device
    /// went away (hangup, invalid descriptor).
    fn poll_readable(&mut self) -> io::Result<bool>;

    /// Fill `buf` with whatever is available. Must not block.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn poll_readable(&mut self) -> io::Result<bool> {
        (**self).poll_readable()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn poll_readable(&mut self) -> io::Result<bool> {
        (**self).poll_readable()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Errors that mean "try again later" rather than "device gone".
#[inline]
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Fixed read buffer with `offset <= len <= capacity` cursors.
///
/// Refilled only once every buffered byte has been consumed.
#[derive(Debug)]
pub struct RefillWindow {
    buf: Box<[u8]>,
    offset: usize,
    len: usize,
}

impl RefillWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)].into_boxed_slice(),
            offset: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes read from the source but not yet handed to the decoder.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.len - self.offset
    }

    pub fn clear(&mut self) {
        self.offset = 0;
        self.len = 0;
    }

    /// Next buffered byte, refilling from `source` when exhausted.
    ///
    /// `Ok(None)` when the source has nothing right now.
    pub fn next_byte<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> io::Result<Option<u8>> {
        if self.offset == self.len {
            self.clear();
            match source.read(&mut self.buf) {
                Ok(n) => self.len = n.min(self.buf.len()),
                Err(e) if is_transient(&e) => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        if self.offset < self.len {
            let byte = self.buf[self.offset];
            self.offset += 1;
            Ok(Some(byte))
        } else {
            Ok(None)
        }
    }
}

impl Default for RefillWindow {
    fn default() -> Self {
        Self::new(DEFAULT_REFILL_BYTES)
    }
}

/// In-memory source over a byte slice, handing out at most `chunk` bytes per
/// read. Used for replaying captured dumps.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::chunked(data, usize::MAX)
    }

    pub fn chunked(data: &'a [u8], chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk: chunk.max(1),
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for SliceSource<'_> {
    fn poll_readable(&mut self) -> io::Result<bool> {
        Ok(self.remaining() > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.remaining().min(self.chunk).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

//! Destination for frames drained in the real-time cycle.

/// Per-cycle event buffer supplied by the real-time transport.
pub trait TransportSink {
    /// Copy one event into the buffer. `false` when the cycle has no room
    /// left; the caller keeps the event for the next cycle.
    fn push_event(&mut self, bytes: &[u8]) -> bool;
}

impl<T: TransportSink + ?Sized> TransportSink for &mut T {
    fn push_event(&mut self, bytes: &[u8]) -> bool {
        (**self).push_event(bytes)
    }
}

/// Preallocated [`TransportSink`] with per-cycle event and byte limits.
///
/// Nothing allocates after construction; `clear()` at the start of each cycle.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    bytes: Vec<u8>,
    events: Vec<(usize, usize)>,
    max_events: usize,
    max_bytes: usize,
}

impl EventBuffer {
    pub fn new(max_events: usize, max_bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(max_bytes),
            events: Vec::with_capacity(max_events),
            max_events,
            max_bytes,
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bytes still free this cycle.
    pub fn remaining_bytes(&self) -> usize {
        self.max_bytes - self.bytes.len()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.events
            .get(index)
            .map(|&(start, end)| &self.bytes[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.events
            .iter()
            .map(move |&(start, end)| &self.bytes[start..end])
    }

    /// Owned copy of the events, for tests and diagnostics.
    pub fn to_vec(&self) -> Vec<Vec<u8>> {
        self.iter().map(<[u8]>::to_vec).collect()
    }
}

impl TransportSink for EventBuffer {
    fn push_event(&mut self, bytes: &[u8]) -> bool {
        if self.events.len() == self.max_events || bytes.len() > self.remaining_bytes() {
            return false;
        }
        let start = self.bytes.len();
        self.bytes.extend_from_slice(bytes);
        self.events.push((start, self.bytes.len()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_iterate() {
        let mut buffer = EventBuffer::new(4, 64);
        assert!(buffer.push_event(&[0x90, 60, 100]));
        assert!(buffer.push_event(&[0xF8]));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(1), Some(&[0xF8][..]));
        assert_eq!(buffer.to_vec(), vec![vec![0x90, 60, 100], vec![0xF8]]);
    }

    #[test]
    fn test_event_limit() {
        let mut buffer = EventBuffer::new(1, 64);
        assert!(buffer.push_event(&[0xFA]));
        assert!(!buffer.push_event(&[0xFC]));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_byte_limit() {
        let mut buffer = EventBuffer::new(8, 4);
        assert!(buffer.push_event(&[0x90, 60, 100]));
        assert!(!buffer.push_event(&[0x80, 60]));
        assert!(buffer.push_event(&[0xF8]));
        assert_eq!(buffer.remaining_bytes(), 0);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = EventBuffer::new(2, 8);
        buffer.push_event(&[0xF8]);
        buffer.push_event(&[0xF8]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.remaining_bytes(), 8);
        assert!(buffer.push_event(&[0xFA]));
    }
}

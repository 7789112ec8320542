//! Fixed-capacity FIFO of finalized frames.
//!
//! Slots are allocated once and overwritten in place. `offset` is the read
//! cursor, `len` the write cursor; both return to zero as soon as the queue is
//! fully drained so the slots get reused from the start.

use crate::frame::{Frame, DEFAULT_MAX_FRAME_BYTES};

/// Default number of queued frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub struct FrameQueue {
    slots: Box<[Frame]>,
    len: usize,
    offset: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize, max_frame_bytes: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Frame::with_capacity(max_frame_bytes))
            .collect();
        Self {
            slots,
            len: 0,
            offset: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Frames enqueued but not yet dequeued.
    #[inline]
    pub fn pending(&self) -> usize {
        self.len - self.offset
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offset == self.len
    }

    /// Copy `frame` into the next slot.
    ///
    /// On overflow the whole pending batch is discarded along with `frame`
    /// and `false` is returned; the queue is then empty and accepts frames
    /// again.
    pub fn try_enqueue(&mut self, frame: &Frame) -> bool {
        if self.is_empty() {
            self.clear();
        }
        if self.len == self.capacity() {
            self.clear();
            return false;
        }
        if !self.slots[self.len].copy_from(frame) {
            // Larger than a slot; only possible with mismatched frame sizes.
            return false;
        }
        self.len += 1;
        true
    }

    /// Oldest pending frame, or `None` when drained.
    pub fn try_dequeue(&mut self) -> Option<&Frame> {
        if self.is_empty() {
            self.clear();
            return None;
        }
        let index = self.offset;
        self.offset += 1;
        if self.is_empty() {
            self.clear();
        }
        Some(&self.slots[index])
    }

    /// Oldest pending frame without consuming it.
    pub fn front(&self) -> Option<&Frame> {
        if self.is_empty() {
            None
        } else {
            Some(&self.slots[self.offset])
        }
    }

    /// Consume the frame returned by [`front`](Self::front).
    pub fn pop_front(&mut self) -> bool {
        self.try_dequeue().is_some()
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.offset = 0;
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, DEFAULT_MAX_FRAME_BYTES)
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_slice(bytes, 8).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = FrameQueue::new(4, 8);
        assert!(queue.try_enqueue(&frame(&[0x90, 60, 100])));
        assert!(queue.try_enqueue(&frame(&[0xF8])));
        assert_eq!(queue.pending(), 2);

        assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0x90, 60, 100]);
        assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0xF8]);
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_cursors_reset_when_drained() {
        let mut queue = FrameQueue::new(2, 8);
        for round in 0..10u8 {
            assert!(queue.try_enqueue(&frame(&[0xC0, round])));
            assert!(queue.try_enqueue(&frame(&[0xC1, round])));
            assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0xC0, round]);
            assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0xC1, round]);
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_overflow_clears_everything() {
        let mut queue = FrameQueue::new(3, 8);
        for i in 0..3u8 {
            assert!(queue.try_enqueue(&frame(&[0xF2, i, i])));
        }

        assert!(!queue.try_enqueue(&frame(&[0xF8])));
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());

        // Accepting again
        assert!(queue.try_enqueue(&frame(&[0xFA])));
        assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0xFA]);
    }

    #[test]
    fn test_overflow_mid_drain_drops_unseen_frames() {
        let mut queue = FrameQueue::new(3, 8);
        for i in 0..3u8 {
            queue.try_enqueue(&frame(&[0xF3, i]));
        }
        assert_eq!(queue.try_dequeue().unwrap().as_bytes(), &[0xF3, 0]);

        assert!(!queue.try_enqueue(&frame(&[0xF8])));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_front_then_pop() {
        let mut queue = FrameQueue::new(2, 8);
        queue.try_enqueue(&frame(&[0xFB]));
        assert_eq!(queue.front().unwrap().as_bytes(), &[0xFB]);
        assert_eq!(queue.pending(), 1);
        assert!(queue.pop_front());
        assert!(queue.front().is_none());
        assert!(!queue.pop_front());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut queue = FrameQueue::new(2, 2);
        assert!(!queue.try_enqueue(&frame(&[0x90, 1, 2])));
        assert!(queue.is_empty());
    }
}

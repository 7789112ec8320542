//! Shared frame queue between the housekeeping and real-time contexts.
//!
//! One lock guards the queue and the write-back device. Housekeeping takes it
//! once per finished frame; the real-time side only ever `try_lock`s for
//! draining, so a busy housekeeper costs a cycle of latency, never a stall.
//! Write-back takes the lock outright since housekeeping holds it only for a
//! frame copy or a pointer swap.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use midibridge_frame::{is_transient, Frame, FrameQueue};
use parking_lot::Mutex;
use tracing::warn;

use crate::config::BridgeConfig;
use crate::transport::TransportSink;

type Writer = Box<dyn Write + Send>;

struct Shared {
    queue: FrameQueue,
    writer: Option<Writer>,
}

/// Counters readable from any context.
#[derive(Debug, Default)]
pub struct BridgeStats {
    enqueued: AtomicU64,
    overflows: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
    delivered: AtomicU64,
    deferred: AtomicU64,
    contended: AtomicU64,
    bytes_written: AtomicU64,
    short_writes: AtomicU64,
    write_errors: AtomicU64,
    unwritten: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    /// Frames accepted into the queue.
    pub enqueued: u64,
    /// Times the queue overflowed and was cleared.
    pub overflows: u64,
    /// Frames lost to overflow, including the one that triggered it.
    pub dropped: u64,
    /// Frames cleared while no consumer was attached.
    pub discarded: u64,
    /// Frames handed to the transport.
    pub delivered: u64,
    /// Drains stopped early because the transport buffer was full.
    pub deferred: u64,
    /// Real-time drains skipped because housekeeping held the lock.
    pub contended: u64,
    pub bytes_written: u64,
    pub short_writes: u64,
    pub write_errors: u64,
    /// Inbound events with no playback device to go to.
    pub unwritten: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            unwritten: self.unwritten.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

pub struct MidiBridge {
    shared: Mutex<Shared>,
    stats: BridgeStats,
    consumer_attached: AtomicBool,
    write_failed: AtomicBool,
}

impl MidiBridge {
    pub fn new(queue_capacity: usize, max_frame_bytes: usize) -> Self {
        Self {
            shared: Mutex::new(Shared {
                queue: FrameQueue::new(queue_capacity, max_frame_bytes),
                writer: None,
            }),
            stats: BridgeStats::default(),
            consumer_attached: AtomicBool::new(false),
            write_failed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.queue_capacity, config.decoder.max_frame_bytes)
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    // --- housekeeping side ---

    /// Queue a finished frame. `false` if the queue overflowed and was
    /// cleared.
    pub fn enqueue(&self, frame: &Frame) -> bool {
        let (accepted, pending) = {
            let mut shared = self.shared.lock();
            let pending = shared.queue.pending();
            (shared.queue.try_enqueue(frame), pending)
        };

        if accepted {
            BridgeStats::bump(&self.stats.enqueued, 1);
        } else {
            BridgeStats::bump(&self.stats.overflows, 1);
            BridgeStats::bump(&self.stats.dropped, pending as u64 + 1);
            warn!("Frame queue overflow, dropped {} frames", pending + 1);
        }
        accepted
    }

    /// Drop every queued frame.
    pub fn clear_queue(&self) {
        let pending = {
            let mut shared = self.shared.lock();
            let pending = shared.queue.pending();
            shared.queue.clear();
            pending
        };
        if pending > 0 {
            BridgeStats::bump(&self.stats.discarded, pending as u64);
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().queue.pending()
    }

    /// Install or remove the write-back device. The previous one is returned
    /// so it can be closed outside the lock.
    pub fn set_writer(&self, writer: Option<Writer>) -> Option<Writer> {
        let previous = std::mem::replace(&mut self.shared.lock().writer, writer);
        self.write_failed.store(false, Ordering::SeqCst);
        previous
    }

    pub fn has_writer(&self) -> bool {
        self.shared.lock().writer.is_some()
    }

    /// `true` once after a write-back hit a permanent error.
    pub fn take_write_failure(&self) -> bool {
        self.write_failed.swap(false, Ordering::SeqCst)
    }

    pub fn set_consumer_attached(&self, attached: bool) {
        self.consumer_attached.store(attached, Ordering::SeqCst);
    }

    pub fn consumer_attached(&self) -> bool {
        self.consumer_attached.load(Ordering::SeqCst)
    }

    // --- real-time side ---

    /// Copy the oldest frame into `out`. `false` when nothing is queued or
    /// the lock is busy.
    pub fn drain_next_frame(&self, out: &mut Frame) -> bool {
        let Some(mut shared) = self.shared.try_lock() else {
            BridgeStats::bump(&self.stats.contended, 1);
            return false;
        };
        let copied = match shared.queue.try_dequeue() {
            Some(frame) => out.copy_from(frame),
            None => return false,
        };
        drop(shared);
        if copied {
            BridgeStats::bump(&self.stats.delivered, 1);
        }
        copied
    }

    /// Move queued frames into `sink` until it is full or the queue is
    /// empty. A frame the sink refuses stays queued for the next cycle.
    pub fn drain_into(&self, sink: &mut dyn TransportSink) -> usize {
        let Some(mut shared) = self.shared.try_lock() else {
            BridgeStats::bump(&self.stats.contended, 1);
            return 0;
        };

        let mut delivered = 0;
        while let Some(frame) = shared.queue.front() {
            if !sink.push_event(frame.as_bytes()) {
                BridgeStats::bump(&self.stats.deferred, 1);
                break;
            }
            shared.queue.pop_front();
            delivered += 1;
        }
        drop(shared);

        BridgeStats::bump(&self.stats.delivered, delivered as u64);
        delivered
    }

    /// Write one transport event to the playback device as is. Returns the
    /// bytes written.
    pub fn write_back(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let mut shared = self.shared.lock();
        let Some(writer) = shared.writer.as_mut() else {
            BridgeStats::bump(&self.stats.unwritten, 1);
            return 0;
        };

        match writer.write(bytes) {
            Ok(n) => {
                BridgeStats::bump(&self.stats.bytes_written, n as u64);
                if n < bytes.len() {
                    BridgeStats::bump(&self.stats.short_writes, 1);
                }
                n
            }
            Err(e) => {
                BridgeStats::bump(&self.stats.write_errors, 1);
                if !is_transient(&e) {
                    self.write_failed.store(true, Ordering::SeqCst);
                }
                0
            }
        }
    }

    /// One transport cycle: drain queued frames into `sink`, then write the
    /// cycle's inbound events back to the device.
    pub fn process_cycle<'a, I>(&self, sink: &mut dyn TransportSink, inbound: I) -> usize
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let delivered = self.drain_into(sink);
        for event in inbound {
            self.write_back(event);
        }
        delivered
    }
}

impl std::fmt::Debug for MidiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBridge")
            .field("consumer_attached", &self.consumer_attached())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

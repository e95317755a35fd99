//! Lock-free ring buffer of interleaved multi-channel frames.
//!
//! Decouples input delivery from block processing: an I/O thread writes
//! frames, the audio thread reads them. Indices are published with
//! release/acquire ordering so the payload written before a `write` is
//! visible to the reader that observes the new index.

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// A bounded single-producer/single-consumer FIFO of frames.
///
/// Capacity is fixed at construction and one slot is reserved so that full
/// and empty are distinguishable: the buffer holds at most `capacity - 1`
/// frames. Writes and reads never block; both return how many frames they
/// actually moved.
///
/// # Safety
///
/// Safe for exactly one producer thread and one consumer thread. A second
/// producer or consumer requires external synchronization.
pub struct FrameRingBuffer {
    buf: UnsafeCell<Vec<f32>>,
    write: AtomicUsize,
    read: AtomicUsize,
    capacity: usize,
    channels: usize,
}

// Safety - single producer / single consumer.
unsafe impl Sync for FrameRingBuffer {}

impl FrameRingBuffer {
    /// Create a buffer holding up to `capacity - 1` frames of `channels`
    /// samples each. Degenerate arguments are raised to the smallest usable
    /// values (capacity 2, one channel).
    pub fn new(capacity: usize, channels: usize) -> Self {
        let capacity = capacity.max(2);
        let channels = channels.max(1);
        Self {
            buf: UnsafeCell::new(vec![0.0; capacity * channels]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            capacity,
            channels,
        }
    }

    /// Write as many whole frames from `frames` as fit; returns the number
    /// written. Producer side only.
    pub fn write(&self, frames: &[f32]) -> usize {
        let count = frames.len() / self.channels;
        let write_pos = self.write.load(Ordering::Relaxed);
        let read_pos = self.read.load(Ordering::Acquire);
        let used = (write_pos + self.capacity - read_pos) % self.capacity;
        let space = self.capacity - 1 - used;
        let writable = count.min(space);

        let buf = unsafe { &mut *self.buf.get() };
        let mut pos = write_pos;
        for frame in frames.chunks_exact(self.channels).take(writable) {
            let base = pos * self.channels;
            buf[base..base + self.channels].copy_from_slice(frame);
            pos = (pos + 1) % self.capacity;
        }

        self.write.store(pos, Ordering::Release);
        writable
    }

    /// Read up to `frames.len() / channels` frames; returns the number read.
    /// Consumer side only.
    pub fn read(&self, frames: &mut [f32]) -> usize {
        let count = frames.len() / self.channels;
        let read_pos = self.read.load(Ordering::Relaxed);
        let write_pos = self.write.load(Ordering::Acquire);
        let available = (write_pos + self.capacity - read_pos) % self.capacity;
        let readable = count.min(available);

        let buf = unsafe { &*self.buf.get() };
        let mut pos = read_pos;
        for frame in frames.chunks_exact_mut(self.channels).take(readable) {
            let base = pos * self.channels;
            frame.copy_from_slice(&buf[base..base + self.channels]);
            pos = (pos + 1) % self.capacity;
        }

        self.read.store(pos, Ordering::Release);
        readable
    }

    /// Frames written but not yet read.
    pub fn available(&self) -> usize {
        let write_pos = self.write.load(Ordering::Acquire);
        let read_pos = self.read.load(Ordering::Acquire);
        (write_pos + self.capacity - read_pos) % self.capacity
    }

    /// Frames that can still be written.
    pub fn space(&self) -> usize {
        self.capacity - 1 - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    /// Drop all unread frames. Consumer side only.
    pub fn clear(&self) {
        let write_pos = self.write.load(Ordering::Acquire);
        self.read.store(write_pos, Ordering::Release);
    }

    /// Total slots, including the reserved one.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_roundtrip() {
        let buffer = FrameRingBuffer::new(8, 2);
        let frames = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert_eq!(buffer.write(&frames), 3);
        let mut out = [0.0f32; 6];
        assert_eq!(buffer.read(&mut out), 3);
        assert_eq!(out, frames);
    }

    #[test]
    fn test_available_tracks_writes_minus_reads() {
        let buffer = FrameRingBuffer::new(16, 1);
        let frame = [0.5f32];
        let mut out = [0.0f32];
        for _ in 0..10 {
            buffer.write(&frame);
        }
        for _ in 0..4 {
            buffer.read(&mut out);
        }
        assert_eq!(buffer.available(), 6);
        assert_eq!(buffer.space(), 16 - 1 - 6);
    }

    #[test]
    fn test_overflow_is_rejected_not_overwritten() {
        let buffer = FrameRingBuffer::new(5, 1);
        let frames = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let written = buffer.write(&frames);
        assert!(written <= 5);
        assert_eq!(written, 4);
        assert!(buffer.is_full());
        assert_eq!(buffer.write(&[7.0]), 0);

        // The stored frames are the first four, in order.
        let mut out = [0.0f32; 6];
        assert_eq!(buffer.read(&mut out), 4);
        assert_eq!(&out[..4], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_read_from_empty_returns_zero() {
        let buffer = FrameRingBuffer::new(4, 1);
        let mut out = [0.0f32; 4];
        assert_eq!(buffer.read(&mut out), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let buffer = FrameRingBuffer::new(4, 1);
        let mut out = [0.0f32; 2];
        // Cycle enough frames through to wrap the indices several times.
        for round in 0..10 {
            let frames = [round as f32, round as f32 + 0.5];
            assert_eq!(buffer.write(&frames), 2);
            assert_eq!(buffer.read(&mut out), 2);
            assert_eq!(out, frames);
        }
    }

    #[test]
    fn test_clear_empties_buffer() {
        let buffer = FrameRingBuffer::new(8, 2);
        buffer.write(&[1.0, 2.0, 3.0, 4.0]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_partial_frame_tail_is_ignored() {
        let buffer = FrameRingBuffer::new(8, 2);
        // Five samples make two whole stereo frames; the dangling sample is
        // not written.
        assert_eq!(buffer.write(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2);
        assert_eq!(buffer.available(), 2);
    }

    #[test]
    fn test_degenerate_construction_is_raised() {
        let buffer = FrameRingBuffer::new(0, 0);
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.channels(), 1);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;

        let buffer = Arc::new(FrameRingBuffer::new(64, 1));
        let producer = Arc::clone(&buffer);
        const TOTAL: usize = 10_000;

        let writer = std::thread::spawn(move || {
            let mut sent = 0usize;
            while sent < TOTAL {
                let frame = [sent as f32];
                if producer.write(&frame) == 1 {
                    sent += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = 0usize;
        let mut out = [0.0f32];
        while received < TOTAL {
            if buffer.read(&mut out) == 1 {
                assert_eq!(out[0], received as f32, "frames reordered");
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }
        writer.join().unwrap();
    }
}

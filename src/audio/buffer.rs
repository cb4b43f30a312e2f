//! Fixed-length circular buffer for `f32` audio samples.
//!
//! The buffer is an arena of `capacity` slots with a write cursor that
//! advances modulo `capacity`.  It is allocated once and never grows, so it
//! is safe to use inside the real-time audio callback.  Readers always get a
//! full chronological copy ([`RingBuffer::snapshot_into`]) written into a
//! buffer they own, instead of a view into the live slots.
//!
//! # Example
//!
//! ```rust
//! use vowel_detect::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items → oldest overwritten
//! let mut out = [0.0; 4];
//! buf.snapshot_into(&mut out);
//! assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// Slots start at `T::default()`; a snapshot taken before the buffer has
/// wrapped therefore begins with default (silent) samples, which keeps the
/// snapshot length constant at `capacity`.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    /// Index of the *next* write position; also the oldest sample once the
    /// buffer has wrapped.
    write_pos: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            write_pos: 0,
        }
    }

    /// Write one sample, overwriting the oldest when full.
    #[inline]
    pub fn push(&mut self, item: T) {
        self.buf[self.write_pos] = item;
        self.write_pos = (self.write_pos + 1) % self.buf.len();
    }

    /// Append `data`, overwriting the oldest samples as needed.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.push(item);
        }
    }

    /// Copy the whole buffer into `out` in chronological order, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != capacity`.
    pub fn snapshot_into(&self, out: &mut [T]) {
        assert_eq!(out.len(), self.buf.len(), "snapshot length mismatch");
        let (newest, oldest) = self.buf.split_at(self.write_pos);
        out[..oldest.len()].copy_from_slice(oldest);
        out[oldest.len()..].copy_from_slice(newest);
    }

    /// Number of slots, i.e. the snapshot length.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(buf: &RingBuffer<f32>) -> Vec<f32> {
        let mut out = vec![-1.0; buf.capacity()];
        buf.snapshot_into(&mut out);
        out
    }

    #[test]
    fn snapshot_before_wrap_is_zero_padded() {
        let mut buf = RingBuffer::new(5);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        // Untouched slots come first because the cursor sits at index 3.
        assert_eq!(snapshot(&buf), vec![0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn push_exactly_capacity() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0]);
        assert_eq!(snapshot(&buf), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn overflow_keeps_newest_in_order() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(snapshot(&buf), vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn multiple_overflows_in_separate_calls() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        buf.push_slice(&[4.0, 5.0]);
        assert_eq!(snapshot(&buf), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn snapshot_does_not_consume() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        assert_eq!(snapshot(&buf), snapshot(&buf));
    }

    #[test]
    fn snapshot_into_overwrites_caller_buffer() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0]);
        let mut out = [9.0_f32; 3];
        buf.snapshot_into(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "snapshot length mismatch")]
    fn snapshot_into_wrong_length_panics() {
        let buf: RingBuffer<f32> = RingBuffer::new(4);
        buf.snapshot_into(&mut [0.0; 3]);
    }

    #[test]
    fn capacity_reported_correctly() {
        let buf: RingBuffer<f32> = RingBuffer::new(1024);
        assert_eq!(buf.capacity(), 1024);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}

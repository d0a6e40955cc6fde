//! Ring buffer backing the module's stream queues.
//!
//! Provides a fixed-capacity FIFO ring buffer with:
//! - Copying reads and writes ([`RingBuffer::read`], [`RingBuffer::write`])
//! - In-place access through circular region views: acquire a view, fill or
//!   drain it, then [`commit`](RingBuffer::commit) or
//!   [`consume`](RingBuffer::consume) the same number of elements
//! - Generic element type
//!
//! Region views expose the whole backing allocation plus a start offset, so
//! the caller wraps at the region boundary instead of assuming a flat slice.

#![deny(unsafe_code)]

use std::num::NonZero;

/// A fixed-capacity ring buffer.
///
/// The buffer tracks separate read and write positions and supports:
/// - [`write`](Self::write): append elements, up to available space
/// - [`read`](Self::read): consume elements into a caller-provided slice
/// - [`read_region`](Self::read_region) / [`consume`](Self::consume): borrow
///   readable elements in place, then release them
/// - [`write_region`](Self::write_region) / [`commit`](Self::commit): fill
///   free space in place, then publish it
///
/// # Invariants
///
/// - `read_pos` and `write_pos` are in `0..=capacity` (may equal capacity;
///   positions wrap on the *next* operation)
/// - `available_read() + available_write() == capacity` always holds
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    read_pos: usize,
    write_pos: usize,
    /// Tracks whether write has wrapped around but read hasn't yet.
    /// When `true`, readable data spans from `read_pos..capacity` then
    /// `0..write_pos`.
    wrapped: bool,
}

impl<T: Clone + Default> RingBuffer<T> {
    /// Creates a new ring buffer that can hold `capacity` elements.
    pub fn new(capacity: NonZero<usize>) -> Self {
        Self {
            data: vec![T::default(); capacity.get()],
            read_pos: 0,
            write_pos: 0,
            wrapped: false,
        }
    }

    /// Resets the buffer to its initial empty state, zeroing all elements.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.wrapped = false;
        self.data.fill(T::default());
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Returns the total capacity of the buffer in elements.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of elements available to read.
    pub fn available_read(&self) -> usize {
        if self.wrapped {
            self.capacity() - self.read_pos + self.write_pos
        } else {
            self.write_pos - self.read_pos
        }
    }

    /// Returns the number of elements that can be written.
    pub fn available_write(&self) -> usize {
        self.capacity() - self.available_read()
    }

    /// Writes elements from `data` into the buffer.
    ///
    /// Returns the number of elements actually written (limited by available
    /// space).
    pub fn write(&mut self, data: &[T]) -> usize {
        let free = self.available_write();
        let write_count = data.len().min(free);
        let margin = self.capacity() - self.write_pos;

        if write_count > margin {
            self.data[self.write_pos..].clone_from_slice(&data[..margin]);
            let remaining = write_count - margin;
            self.data[..remaining].clone_from_slice(&data[margin..margin + remaining]);
        } else {
            self.data[self.write_pos..self.write_pos + write_count]
                .clone_from_slice(&data[..write_count]);
        }

        self.advance_write_pos(write_count);
        write_count
    }

    /// Reads up to `output.len()` elements, copying them into `output`.
    ///
    /// Returns the number of elements actually read (limited by available
    /// data). The read cursor advances past the consumed elements.
    pub fn read(&mut self, output: &mut [T]) -> usize {
        let readable = self.available_read();
        let read_count = output.len().min(readable);
        if read_count == 0 {
            return 0;
        }

        let margin = self.capacity() - self.read_pos;
        if read_count > margin {
            output[..margin].clone_from_slice(&self.data[self.read_pos..]);
            output[margin..read_count].clone_from_slice(&self.data[..read_count - margin]);
        } else {
            output[..read_count]
                .clone_from_slice(&self.data[self.read_pos..self.read_pos + read_count]);
        }

        self.advance_read_pos(read_count);
        read_count
    }

    /// Borrows exactly `count` readable elements in place.
    ///
    /// Returns `None` if fewer than `count` elements are available. The read
    /// cursor does not move; call [`consume`](Self::consume) afterwards.
    pub fn read_region(&self, count: usize) -> Option<Region<'_, T>> {
        if count > self.available_read() {
            return None;
        }
        Some(Region {
            data: &self.data,
            start: self.read_pos % self.capacity(),
            len: count,
        })
    }

    /// Releases up to `count` elements from the front of the buffer.
    ///
    /// Returns the number of elements actually released.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.available_read());
        self.advance_read_pos(count);
        count
    }

    /// Borrows exactly `count` free elements in place for writing.
    ///
    /// Returns `None` if fewer than `count` elements are free. Nothing is
    /// published until [`commit`](Self::commit) is called.
    pub fn write_region(&mut self, count: usize) -> Option<RegionMut<'_, T>> {
        if count > self.available_write() {
            return None;
        }
        let start = self.write_pos % self.capacity();
        Some(RegionMut {
            data: &mut self.data,
            start,
            len: count,
        })
    }

    /// Publishes up to `count` elements previously filled through
    /// [`write_region`](Self::write_region).
    ///
    /// Returns the number of elements actually published.
    pub fn commit(&mut self, count: usize) -> usize {
        let count = count.min(self.available_write());
        self.advance_write_pos(count);
        count
    }

    /// Advances the read position forward by `count` elements.
    ///
    /// `count` is already known to be bounded by `available_read`.
    fn advance_read_pos(&mut self, count: usize) {
        let mut pos = self.read_pos + count;
        // Position can equal capacity (wraps lazily), but not exceed it.
        if pos > self.capacity() {
            pos -= self.capacity();
            self.wrapped = false;
        }
        self.read_pos = pos;
    }

    /// Advances the write position forward by `count` elements.
    ///
    /// `count` is already known to be bounded by `available_write`.
    fn advance_write_pos(&mut self, count: usize) {
        let margin = self.capacity() - self.write_pos;
        if count > margin {
            self.write_pos = count - margin;
            self.wrapped = true;
        } else {
            self.write_pos += count;
        }
    }
}

/// Readable window of a [`RingBuffer`].
///
/// `region()` is the whole backing allocation; the window starts at
/// `start()` and continues for `len()` elements, wrapping at the end of the
/// region.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a, T> {
    data: &'a [T],
    start: usize,
    len: usize,
}

impl<'a, T> Region<'a, T> {
    /// Builds a view over an arbitrary backing slice.
    ///
    /// # Panics
    ///
    /// Panics if `start` is outside `data` or `len` exceeds `data.len()`.
    pub fn new(data: &'a [T], start: usize, len: usize) -> Self {
        assert!(start < data.len(), "start ({start}) outside region");
        assert!(len <= data.len(), "len ({len}) exceeds region");
        Self { data, start, len }
    }

    /// The whole backing region the window lives in.
    #[inline]
    pub fn region(&self) -> &'a [T] {
        self.data
    }

    /// Index of the first element of the window inside [`region`](Self::region).
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of elements in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the window crosses the end of the region.
    #[inline]
    pub fn is_wrapped(&self) -> bool {
        self.start + self.len > self.data.len()
    }

    /// Returns the two contiguous halves of the window.
    pub fn as_slices(&self) -> (&'a [T], &'a [T]) {
        let first = self.len.min(self.data.len() - self.start);
        (
            &self.data[self.start..self.start + first],
            &self.data[..self.len - first],
        )
    }
}

/// Writable window of a [`RingBuffer`].
///
/// Same layout rules as [`Region`].
#[derive(Debug)]
pub struct RegionMut<'a, T> {
    data: &'a mut [T],
    start: usize,
    len: usize,
}

impl<'a, T> RegionMut<'a, T> {
    /// Builds a view over an arbitrary backing slice.
    ///
    /// # Panics
    ///
    /// Panics if `start` is outside `data` or `len` exceeds `data.len()`.
    pub fn new(data: &'a mut [T], start: usize, len: usize) -> Self {
        assert!(start < data.len(), "start ({start}) outside region");
        assert!(len <= data.len(), "len ({len}) exceeds region");
        Self { data, start, len }
    }

    #[inline]
    pub fn region(&self) -> &[T] {
        self.data
    }

    /// Mutable access to the whole backing region.
    #[inline]
    pub fn region_mut(&mut self) -> &mut [T] {
        self.data
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
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
    pub fn is_wrapped(&self) -> bool {
        self.start + self.len > self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::RingBuffer;

    fn rb(capacity: usize) -> RingBuffer<i32> {
        RingBuffer::new(NonZero::new(capacity).unwrap())
    }

    fn set_incrementing_data(data: &mut [i32], start: i32) -> i32 {
        let mut val = start;
        for elem in data.iter_mut() {
            *elem = val;
            val += 1;
        }
        val
    }

    fn check_incrementing_data(data: &[i32], start: i32) -> i32 {
        let mut val = start;
        for (i, &elem) in data.iter().enumerate() {
            assert_eq!(elem, val, "mismatch at index {i}");
            val += 1;
        }
        val
    }

    /// Random interleaving of writes and reads, checking FIFO order.
    ///
    /// With `use_regions` the traffic goes through the in-place region API.
    fn random_stress_test(seed: u64, use_regions: bool) {
        let mut rng_state = seed;
        let mut next = || -> usize {
            // xorshift64
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            rng_state as usize
        };

        let num_tests = 10;
        let num_ops = 1000;
        let max_buffer_size = 1000;

        for _ in 0..num_tests {
            let buffer_size = (next() % max_buffer_size).max(1);
            let mut write_data = vec![0i32; buffer_size];
            let mut read_data = vec![0i32; buffer_size];
            let mut buffer = rb(buffer_size);

            let mut buffer_consumed: usize = 0;
            let mut write_element: i32 = 0;
            let mut read_element: i32 = 0;

            for _ in 0..num_ops {
                let do_write = next() % 2 == 0;
                let num_elements = next() % buffer_size;

                if do_write {
                    let buffer_available = buffer_size - buffer_consumed;
                    assert_eq!(buffer_available, buffer.available_write());
                    let expected = num_elements.min(buffer_available);
                    write_element =
                        set_incrementing_data(&mut write_data[..expected], write_element);
                    if use_regions {
                        let mut region = buffer.write_region(expected).unwrap();
                        let start = region.start();
                        let region_len = region.region().len();
                        for (i, &v) in write_data[..expected].iter().enumerate() {
                            region.region_mut()[(start + i) % region_len] = v;
                        }
                        assert_eq!(expected, buffer.commit(expected));
                    } else {
                        let written = buffer.write(&write_data[..num_elements]);
                        assert_eq!(expected, written);
                    }
                    buffer_consumed = (buffer_consumed + expected).min(buffer_size);
                } else {
                    let expected = num_elements.min(buffer_consumed);
                    assert_eq!(buffer_consumed, buffer.available_read());

                    if use_regions {
                        let region = buffer.read_region(expected).unwrap();
                        let (head, tail) = region.as_slices();
                        read_element = check_incrementing_data(head, read_element);
                        read_element = check_incrementing_data(tail, read_element);
                        assert_eq!(expected, buffer.consume(expected));
                    } else {
                        let read_count = buffer.read(&mut read_data[..num_elements]);
                        assert_eq!(expected, read_count);
                        read_element =
                            check_incrementing_data(&read_data[..expected], read_element);
                    }

                    buffer_consumed = buffer_consumed.saturating_sub(expected);
                }
            }
        }
    }

    #[test]
    fn stress_test_with_copy() {
        random_stress_test(12345, false);
    }

    #[test]
    fn stress_test_with_regions() {
        random_stress_test(12345, true);
    }

    #[test]
    fn read_region_is_flat_when_no_wrap() {
        let mut buf = rb(4);
        assert_eq!(4, buf.write(&[10, 20, 30, 40]));

        let region = buf.read_region(4).unwrap();
        assert!(!region.is_wrapped());
        assert_eq!(region.start(), 0);
        assert_eq!(region.as_slices(), (&[10, 20, 30, 40][..], &[][..]));
    }

    #[test]
    fn read_region_wraps_at_region_end() {
        let mut buf = rb(4);

        assert_eq!(4, buf.write(&[1, 2, 3, 4]));
        let mut discard = [0i32; 2];
        buf.read(&mut discard);
        assert_eq!(2, buf.write(&[5, 6]));

        let region = buf.read_region(4).unwrap();
        assert!(region.is_wrapped());
        assert_eq!(region.start(), 2);
        assert_eq!(region.region().len(), 4);
        assert_eq!(region.as_slices(), (&[3, 4][..], &[5, 6][..]));
    }

    #[test]
    fn read_region_requires_enough_data() {
        let mut buf = rb(8);
        buf.write(&[1, 2, 3]);
        assert!(buf.read_region(4).is_none());
        assert!(buf.read_region(3).is_some());
    }

    #[test]
    fn read_region_does_not_move_cursor() {
        let mut buf = rb(8);
        buf.write(&[1, 2, 3]);
        let _ = buf.read_region(3).unwrap();
        assert_eq!(3, buf.available_read());
        assert_eq!(3, buf.consume(3));
        assert_eq!(0, buf.available_read());
    }

    #[test]
    fn write_region_then_commit_publishes() {
        let mut buf = rb(4);
        buf.write(&[1, 2, 3]);
        let mut out = [0i32; 3];
        buf.read(&mut out);

        let mut region = buf.write_region(3).unwrap();
        assert!(region.is_wrapped());
        let start = region.start();
        for (i, v) in [7, 8, 9].into_iter().enumerate() {
            region.region_mut()[(start + i) % 4] = v;
        }
        assert_eq!(0, buf.available_read());
        assert_eq!(3, buf.commit(3));

        let mut out = [0i32; 3];
        assert_eq!(3, buf.read(&mut out));
        assert_eq!(out, [7, 8, 9]);
    }

    #[test]
    fn write_region_requires_enough_space() {
        let mut buf = rb(4);
        buf.write(&[1, 2]);
        assert!(buf.write_region(3).is_none());
        assert!(buf.write_region(2).is_some());
    }

    #[test]
    fn consume_and_commit_are_clamped() {
        let mut buf = rb(4);
        buf.write(&[1, 2]);
        assert_eq!(2, buf.consume(10));
        assert_eq!(4, buf.commit(10));
        assert_eq!(4, buf.available_read());
    }

    #[test]
    fn write_limited_by_capacity() {
        let mut buf = rb(4);
        let written = buf.write(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(4, written);
        assert_eq!(4, buf.available_read());
        assert_eq!(0, buf.available_write());
    }

    #[test]
    fn read_from_empty() {
        let mut buf = rb(4);
        let mut out = [0i32; 4];
        assert_eq!(0, buf.read(&mut out));
    }

    #[test]
    fn clear_resets_state() {
        let mut buf = rb(4);
        buf.write(&[1, 2, 3, 4]);
        assert_eq!(4, buf.available_read());

        buf.clear();
        assert_eq!(0, buf.available_read());
        assert_eq!(4, buf.available_write());
    }

    // -- Property tests --

    #[proptest]
    fn available_read_plus_write_equals_capacity(
        #[strategy(1..=500usize)] capacity: usize,
        #[strategy(pvec(any::<i32>(), 0..500))] data: Vec<i32>,
    ) {
        let mut buf = rb(capacity);
        buf.write(&data);
        prop_assert_eq!(buf.available_read() + buf.available_write(), capacity);
    }

    #[proptest]
    fn write_then_read_preserves_order(
        #[strategy(1..=500usize)] capacity: usize,
        #[strategy(pvec(any::<i32>(), 0..=#capacity))] data: Vec<i32>,
    ) {
        let mut buf = rb(capacity);
        let written = buf.write(&data);
        let mut out = vec![0i32; written];
        let read_count = buf.read(&mut out);
        prop_assert_eq!(read_count, written);
        prop_assert_eq!(&out[..read_count], &data[..written]);
    }

    #[proptest]
    fn region_halves_cover_window(
        #[strategy(1..=64usize)] capacity: usize,
        #[strategy(0..=#capacity)] skew: usize,
        #[strategy(0..=#capacity)] count: usize,
    ) {
        let mut buf = rb(capacity);
        buf.commit(skew);
        buf.consume(skew);
        buf.commit(count);
        let region = buf.read_region(count).unwrap();
        let (head, tail) = region.as_slices();
        prop_assert_eq!(head.len() + tail.len(), count);
        prop_assert_eq!(region.is_wrapped(), !tail.is_empty());
    }

    #[proptest]
    fn stress_random_seed(#[strategy(1..=100_000u64)] seed: u64) {
        random_stress_test(seed, false);
    }

    #[proptest]
    fn stress_random_seed_regions(#[strategy(1..=100_000u64)] seed: u64) {
        random_stress_test(seed, true);
    }
}

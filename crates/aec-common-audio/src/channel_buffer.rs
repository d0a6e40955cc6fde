//! Channel-major scratch buffer for one processing period.
//!
//! The buffer stores audio data in a single contiguous allocation, laid out as:
//!
//! ```text
//! [ ch0 (num_frames) | ch1 (num_frames) | ... ]
//! ```
//!
//! Engines take per-channel slices (`&[&[T]]`). Those tables are built on the
//! stack by [`ChannelBuffer::with_channels`] and
//! [`ChannelBuffer::with_channels_mut`], so handing the buffer to an engine
//! never allocates.

use std::collections::TryReserveError;

use derive_more::Debug;

/// Upper bound on channels per buffer, matching the pipeline's channel map.
pub const MAX_CHANNELS: usize = 8;

/// Multi-channel audio buffer, channel-major.
#[derive(Debug)]
pub struct ChannelBuffer<T> {
    #[debug(skip)]
    data: Vec<T>,
    num_frames: usize,
    num_allocated_channels: usize,
    /// User-visible channel count (can be reduced via [`set_num_channels`]).
    ///
    /// [`set_num_channels`]: ChannelBuffer::set_num_channels
    num_channels: usize,
}

impl<T: Clone + Default> ChannelBuffer<T> {
    /// Create a new zero-initialized buffer, reporting allocation failure
    /// instead of aborting.
    ///
    /// # Panics
    ///
    /// Panics if `num_channels` is zero or above [`MAX_CHANNELS`].
    pub fn try_new(num_frames: usize, num_channels: usize) -> Result<Self, TryReserveError> {
        assert!(num_channels > 0, "num_channels must be > 0");
        assert!(
            num_channels <= MAX_CHANNELS,
            "num_channels ({num_channels}) exceeds MAX_CHANNELS ({MAX_CHANNELS})"
        );
        let len = num_frames * num_channels;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, T::default());
        Ok(Self {
            data,
            num_frames,
            num_allocated_channels: num_channels,
            num_channels,
        })
    }

    /// Create a new zero-initialized buffer.
    ///
    /// # Panics
    ///
    /// Panics on allocation failure and on the conditions of [`try_new`].
    ///
    /// [`try_new`]: ChannelBuffer::try_new
    pub fn new(num_frames: usize, num_channels: usize) -> Self {
        match Self::try_new(num_frames, num_channels) {
            Ok(buf) => buf,
            Err(e) => panic!("channel buffer allocation failed: {e}"),
        }
    }

    /// Zero every allocated sample.
    pub fn clear(&mut self) {
        self.data.fill(T::default());
    }
}

impl<T> ChannelBuffer<T> {
    /// Frames per channel.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Number of visible channels (may be less than allocated).
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of channels the allocation was sized for.
    #[inline]
    pub fn num_allocated_channels(&self) -> usize {
        self.num_allocated_channels
    }

    /// Total number of allocated elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.num_frames * self.num_allocated_channels
    }

    /// Set the user-visible number of channels.
    ///
    /// Must be in `1..=` the allocated channel count.
    pub fn set_num_channels(&mut self, num_channels: usize) {
        assert!(num_channels > 0, "num_channels must be > 0");
        assert!(
            num_channels <= self.num_allocated_channels,
            "num_channels ({num_channels}) exceeds allocated ({0})",
            self.num_allocated_channels
        );
        self.num_channels = num_channels;
    }

    /// Samples of one channel.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[T] {
        debug_assert!(channel < self.num_allocated_channels);
        let start = channel * self.num_frames;
        &self.data[start..start + self.num_frames]
    }

    /// Mutable samples of one channel.
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [T] {
        debug_assert!(channel < self.num_allocated_channels);
        let start = channel * self.num_frames;
        &mut self.data[start..start + self.num_frames]
    }

    /// Store one sample. Hot-path accessor for de-interleaving.
    #[inline]
    pub fn set(&mut self, channel: usize, frame: usize, value: T) {
        self.data[channel * self.num_frames + frame] = value;
    }

    /// Raw access to the underlying data.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }


    /// Run `f` over a table of the visible channels.
    pub fn with_channels<R>(&self, f: impl FnOnce(&[&[T]]) -> R) -> R {
        let mut table: [&[T]; MAX_CHANNELS] = [&[][..]; MAX_CHANNELS];
        for (slot, samples) in table
            .iter_mut()
            .zip(self.data.chunks_exact(self.num_frames.max(1)))
        {
            *slot = samples;
        }
        f(&table[..self.num_channels])
    }

    /// Run `f` over a mutable table of the visible channels.
    pub fn with_channels_mut<R>(&mut self, f: impl FnOnce(&mut [&mut [T]]) -> R) -> R {
        let mut table: [&mut [T]; MAX_CHANNELS] = Default::default();
        for (slot, samples) in table
            .iter_mut()
            .zip(self.data.chunks_exact_mut(self.num_frames.max(1)))
        {
            *slot = samples;
        }
        f(&mut table[..self.num_channels])
    }
}

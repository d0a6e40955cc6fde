//! Stream seams between the module and the pipeline framework.
//!
//! A source hands out a circular read view of its queued bytes and a sink a
//! circular write view of its free bytes. Views are [`Region`]s: the whole
//! backing region plus a start offset, wrapping at the region end.

use aec_ring_buffer::{Region, RegionMut};

use crate::config::AudioFormat;

/// Queue identity carried by the source that feeds back loudspeaker audio.
pub const REFERENCE_QUEUE_ID: u32 = 1;

/// Queue identity conventionally used for the microphone source.
pub const MICROPHONE_QUEUE_ID: u32 = 0;

/// Failures of the acquire/release protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Fewer bytes queued (or free) than requested.
    #[error("requested {requested} bytes, only {available} available")]
    Insufficient { requested: usize, available: usize },
    /// Released or committed more bytes than the stream holds.
    #[error("released {requested} bytes, only {held} held")]
    Overrelease { requested: usize, held: usize },
}

/// Input stream.
pub trait Source {
    /// Queue identity tag used to classify the stream at prepare.
    fn queue_id(&self) -> u32;

    /// Current format.
    fn format(&self) -> AudioFormat;

    /// Pin the stream to `format`.
    fn set_format(&mut self, format: &AudioFormat);

    /// Bytes the stream guarantees to have queued when the module runs.
    fn min_available(&self) -> usize;

    /// Borrow a circular view of the next `bytes` queued bytes.
    fn get_data(&mut self, bytes: usize) -> Result<Region<'_, u8>, StreamError>;

    /// Drop `bytes` bytes from the front of the queue.
    fn release_data(&mut self, bytes: usize) -> Result<(), StreamError>;

    fn channels(&self) -> usize {
        self.format().channels
    }

    fn frame_bytes(&self) -> usize {
        self.format().frame_bytes()
    }
}

/// Output stream.
pub trait Sink {
    fn format(&self) -> AudioFormat;

    fn set_format(&mut self, format: &AudioFormat);

    /// Bytes the stream guarantees to have free when the module runs.
    fn min_free_space(&self) -> usize;

    /// Borrow a circular view of the next `bytes` free bytes.
    fn get_buffer(&mut self, bytes: usize) -> Result<RegionMut<'_, u8>, StreamError>;

    /// Publish `bytes` written bytes to the consumer.
    fn commit_buffer(&mut self, bytes: usize) -> Result<(), StreamError>;

    fn channels(&self) -> usize {
        self.format().channels
    }

    fn frame_bytes(&self) -> usize {
        self.format().frame_bytes()
    }
}

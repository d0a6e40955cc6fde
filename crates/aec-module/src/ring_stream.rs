//! Ring-buffer backed [`Source`] and [`Sink`].
//!
//! Hosts without their own queue objects can wire the module with these.
//! The producer side of a [`RingSource`] and the consumer side of a
//! [`RingSink`] are plain copying calls.

use std::num::NonZero;

use aec_common_audio::audio_util::S16_BYTES;
use aec_ring_buffer::{Region, RegionMut, RingBuffer};

use crate::config::AudioFormat;
use crate::stream::{Sink, Source, StreamError};

/// Source queue over a byte ring.
#[derive(Debug, Clone)]
pub struct RingSource {
    queue_id: u32,
    format: AudioFormat,
    period_bytes: usize,
    buffer: RingBuffer<u8>,
}

impl RingSource {
    /// Create a source holding up to `capacity` bytes. `period_bytes` is the
    /// amount the pipeline declares available per period.
    pub fn new(
        queue_id: u32,
        format: AudioFormat,
        capacity: NonZero<usize>,
        period_bytes: usize,
    ) -> Self {
        Self {
            queue_id,
            format,
            period_bytes,
            buffer: RingBuffer::new(capacity),
        }
    }

    /// Queue raw bytes. Returns how many fit.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        self.buffer.write(bytes)
    }

    /// Queue interleaved 16-bit samples. Returns how many samples fit.
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        let whole = self.buffer.available_write() / S16_BYTES;
        let bytes: Vec<u8> = samples[..samples.len().min(whole)]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        self.buffer.write(&bytes) / S16_BYTES
    }

    /// Bytes currently queued.
    pub fn queued(&self) -> usize {
        self.buffer.available_read()
    }
}

impl Source for RingSource {
    fn queue_id(&self) -> u32 {
        self.queue_id
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn set_format(&mut self, format: &AudioFormat) {
        self.format = *format;
    }

    fn min_available(&self) -> usize {
        self.period_bytes
    }

    fn get_data(&mut self, bytes: usize) -> Result<Region<'_, u8>, StreamError> {
        let available = self.buffer.available_read();
        self.buffer.read_region(bytes).ok_or(StreamError::Insufficient {
            requested: bytes,
            available,
        })
    }

    fn release_data(&mut self, bytes: usize) -> Result<(), StreamError> {
        let held = self.buffer.available_read();
        if bytes > held {
            return Err(StreamError::Overrelease {
                requested: bytes,
                held,
            });
        }
        self.buffer.consume(bytes);
        Ok(())
    }
}

/// Sink queue over a byte ring.
#[derive(Debug, Clone)]
pub struct RingSink {
    format: AudioFormat,
    period_bytes: usize,
    buffer: RingBuffer<u8>,
}

impl RingSink {
    pub fn new(format: AudioFormat, capacity: NonZero<usize>, period_bytes: usize) -> Self {
        Self {
            format,
            period_bytes,
            buffer: RingBuffer::new(capacity),
        }
    }

    /// Pad the queue with `bytes` zero bytes, shifting where the next period
    /// lands in the ring.
    pub fn skip(&mut self, bytes: usize) -> usize {
        let written = self.buffer.write(&vec![0; bytes]);
        let mut scratch = vec![0; written];
        self.buffer.read(&mut scratch)
    }

    /// Drain committed bytes into `out`. Returns how many were copied.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        self.buffer.read(out)
    }

    /// Drain all committed bytes as interleaved 16-bit samples.
    pub fn pop_samples(&mut self) -> Vec<i16> {
        let mut bytes = vec![0; self.committed() / S16_BYTES * S16_BYTES];
        let read = self.pop(&mut bytes);
        bytes[..read]
            .chunks_exact(S16_BYTES)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Bytes committed and not yet drained.
    pub fn committed(&self) -> usize {
        self.buffer.available_read()
    }
}

impl Sink for RingSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn set_format(&mut self, format: &AudioFormat) {
        self.format = *format;
    }

    fn min_free_space(&self) -> usize {
        self.period_bytes
    }

    fn get_buffer(&mut self, bytes: usize) -> Result<RegionMut<'_, u8>, StreamError> {
        let available = self.buffer.available_write();
        self.buffer
            .write_region(bytes)
            .ok_or(StreamError::Insufficient {
                requested: bytes,
                available,
            })
    }

    fn commit_buffer(&mut self, bytes: usize) -> Result<(), StreamError> {
        let held = self.buffer.available_write();
        if bytes > held {
            return Err(StreamError::Overrelease {
                requested: bytes,
                held,
            });
        }
        self.buffer.commit(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZero<usize> {
        NonZero::new(n).unwrap()
    }

    #[test]
    fn source_view_wraps_and_release_advances() {
        let mut source = RingSource::new(0, AudioFormat::s16(16_000, 1), nz(6), 4);
        source.push(&[9, 9, 9, 9]);
        source.release_data(4).unwrap();
        source.push(&[1, 2, 3, 4]);

        let view = source.get_data(4).unwrap();
        assert_eq!(view.start(), 4);
        assert!(view.is_wrapped());
        assert_eq!(view.as_slices(), (&[1, 2][..], &[3, 4][..]));

        source.release_data(4).unwrap();
        assert_eq!(source.queued(), 0);
    }

    #[test]
    fn source_refuses_short_reads() {
        let mut source = RingSource::new(0, AudioFormat::s16(16_000, 1), nz(8), 4);
        source.push(&[1, 2]);
        assert_eq!(
            source.get_data(4).unwrap_err(),
            StreamError::Insufficient {
                requested: 4,
                available: 2,
            }
        );
        assert_eq!(
            source.release_data(3).unwrap_err(),
            StreamError::Overrelease {
                requested: 3,
                held: 2,
            }
        );
    }

    #[test]
    fn push_samples_is_little_endian() {
        let mut source = RingSource::new(0, AudioFormat::s16(16_000, 1), nz(4), 4);
        assert_eq!(source.push_samples(&[0x0102, 0x0304, 0x0506]), 2);
        let view = source.get_data(4).unwrap();
        assert_eq!(view.as_slices().0, &[0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn sink_commit_publishes_written_bytes() {
        let mut sink = RingSink::new(AudioFormat::s16(16_000, 1), nz(8), 4);
        {
            let mut view = sink.get_buffer(4).unwrap();
            view.region_mut()[..4].copy_from_slice(&[0x34, 0x12, 0xff, 0xff]);
        }
        assert_eq!(sink.committed(), 0);
        sink.commit_buffer(4).unwrap();
        assert_eq!(sink.pop_samples(), vec![0x1234, -1]);
    }

    #[test]
    fn sink_skip_moves_write_position() {
        let mut sink = RingSink::new(AudioFormat::s16(16_000, 1), nz(8), 4);
        assert_eq!(sink.skip(6), 6);
        assert_eq!(sink.committed(), 0);
        let view = sink.get_buffer(4).unwrap();
        assert_eq!(view.start(), 6);
        assert!(view.is_wrapped());
    }

    #[test]
    fn sink_refuses_overcommit() {
        let mut sink = RingSink::new(AudioFormat::s16(16_000, 1), nz(4), 4);
        assert!(sink.get_buffer(5).is_err());
        assert!(sink.commit_buffer(5).is_err());
    }
}

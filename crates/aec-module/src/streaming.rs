//! Per-period streaming loop.
//!
//! One period moves exactly `frame_count` frames through the engine:
//!
//! 1. De-interleave the reference view into the reference scratch and hand
//!    it to the engine's render analysis, then release the reference bytes.
//! 2. De-interleave the microphone view into the capture scratch, release
//!    it, and let the engine process the capture scratch in place.
//! 3. Interleave the capture scratch into the output view and commit it.
//!
//! Stream views are circular: every sample position wraps at the end of the
//! view's backing region. Only the configured channels are read from a
//! stream; wider streams are strided over and wider sinks get silence in the
//! extra channels.

use aec_common_audio::audio_util::{S16_BYTES, read_s16_le, write_s16_le};
use aec_common_audio::{ChannelBuffer, EngineSample};
use aec_ring_buffer::{Region, RegionMut};

use crate::engine::EchoCanceller;
use crate::error::{Error, Result, StreamRole};
use crate::stream::{Sink, Source};

/// Scratch buffers and engine for one period.
pub struct Period<'a, E: EchoCanceller> {
    pub engine: &'a mut E,
    pub frames: usize,
    pub reference_scratch: &'a mut ChannelBuffer<E::Sample>,
    pub capture_scratch: &'a mut ChannelBuffer<E::Sample>,
}

impl<E: EchoCanceller> Period<'_, E> {
    /// Run one period over the bound streams.
    pub fn run(
        self,
        reference: &mut dyn Source,
        microphone: &mut dyn Source,
        output: &mut dyn Sink,
    ) -> Result<()> {
        let reference_bytes = read_period(
            reference,
            StreamRole::Reference,
            self.frames,
            self.reference_scratch,
        )?;
        self.reference_scratch
            .with_channels(|channels| self.engine.analyze_render(channels));
        release_period(reference, StreamRole::Reference, reference_bytes)?;

        let microphone_bytes = read_period(
            microphone,
            StreamRole::Microphone,
            self.frames,
            self.capture_scratch,
        )?;
        release_period(microphone, StreamRole::Microphone, microphone_bytes)?;
        self.capture_scratch
            .with_channels_mut(|channels| self.engine.process_capture(channels));

        write_period(output, self.frames, self.capture_scratch)
    }
}

/// Acquire one period from `source` and de-interleave it into `scratch`.
/// Returns the number of bytes to release.
fn read_period<S: EngineSample>(
    source: &mut dyn Source,
    role: StreamRole,
    frames: usize,
    scratch: &mut ChannelBuffer<S>,
) -> Result<usize> {
    let channels = source.channels();
    let bytes = frames * source.frame_bytes();
    let view = source
        .get_data(bytes)
        .map_err(|source| Error::Stream { role, source })?;
    deinterleave_region(&view, channels, frames, scratch);
    Ok(bytes)
}

fn release_period(source: &mut dyn Source, role: StreamRole, bytes: usize) -> Result<()> {
    source
        .release_data(bytes)
        .map_err(|source| Error::Stream { role, source })
}

/// Acquire one period of `sink`, interleave `scratch` into it, and commit.
fn write_period<S: EngineSample>(
    sink: &mut dyn Sink,
    frames: usize,
    scratch: &ChannelBuffer<S>,
) -> Result<()> {
    let role = StreamRole::Output;
    let channels = sink.channels();
    let bytes = frames * sink.frame_bytes();
    {
        let mut view = sink
            .get_buffer(bytes)
            .map_err(|source| Error::Stream { role, source })?;
        interleave_region(scratch, &mut view, channels, frames);
    }
    sink.commit_buffer(bytes)
        .map_err(|source| Error::Stream { role, source })
}

/// De-interleave `frames` S16 frames of `stream_channels` channels from a
/// circular view into the visible channels of `scratch`.
pub fn deinterleave_region<S: EngineSample>(
    view: &Region<'_, u8>,
    stream_channels: usize,
    frames: usize,
    scratch: &mut ChannelBuffer<S>,
) {
    let region = view.region();
    let len = region.len();
    let stride = stream_channels * S16_BYTES;
    let channels = scratch.num_channels();
    debug_assert!(channels <= stream_channels);

    let mut pos = view.start();
    for frame in 0..frames {
        for ch in 0..channels {
            let sample = read_s16_le(region, (pos + ch * S16_BYTES) % len);
            scratch.set(ch, frame, S::from_s16(sample));
        }
        pos = (pos + stride) % len;
    }
}

/// Interleave the visible channels of `scratch` into a circular view of
/// `stream_channels` channels. Channels past the scratch are written as
/// silence.
pub fn interleave_region<S: EngineSample>(
    scratch: &ChannelBuffer<S>,
    view: &mut RegionMut<'_, u8>,
    stream_channels: usize,
    frames: usize,
) {
    let start = view.start();
    let region = view.region_mut();
    let len = region.len();
    let stride = stream_channels * S16_BYTES;
    let channels = scratch.num_channels();

    let mut pos = start;
    for frame in 0..frames {
        for ch in 0..stream_channels {
            let sample = if ch < channels {
                scratch.channel(ch)[frame].to_s16()
            } else {
                0
            };
            write_s16_le(region, (pos + ch * S16_BYTES) % len, sample);
        }
        pos = (pos + stride) % len;
    }
}

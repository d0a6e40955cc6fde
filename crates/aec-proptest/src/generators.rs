//! Stream layout and audio generators for property-based testing.
//!
//! Provides both strategy functions (for use with `#[strategy(...)]`) and
//! `Arbitrary`-deriving structs for module-level test inputs.

use aec_common_audio::audio_util::interleave;
use proptest::prelude::*;
use test_strategy::Arbitrary;

/// A supported module sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum SampleRate {
    #[weight(1)]
    Hz8000,
    #[weight(1)]
    Hz16000,
    #[weight(1)]
    Hz32000,
    #[weight(1)]
    Hz48000,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz16000 => 16000,
            Self::Hz32000 => 32000,
            Self::Hz48000 => 48000,
        }
    }

    /// Frames in one 10 ms period at this rate.
    pub fn frame_count(self) -> usize {
        (self.hz() / 100) as usize
    }
}

/// Configured channel counts plus stream channel counts that satisfy them.
///
/// Streams may be wider than what the module consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct StreamLayout {
    #[strategy(1..=4usize)]
    pub capture_channels: usize,
    #[strategy(1..=4usize)]
    pub reference_channels: usize,
    #[strategy(#reference_channels..=#reference_channels + 2)]
    pub reference_stream_channels: usize,
    #[strategy(#capture_channels..=#capture_channels + 2)]
    pub microphone_stream_channels: usize,
    #[strategy(#capture_channels..=#capture_channels + 2)]
    pub output_stream_channels: usize,
}

/// A stream layout with one period of audio for each source.
#[derive(Debug, Clone, Arbitrary)]
pub struct PeriodInput {
    pub sample_rate: SampleRate,
    pub layout: StreamLayout,
    #[strategy(interleaved_i16(#sample_rate.frame_count(), #layout.reference_stream_channels))]
    pub reference: Vec<i16>,
    #[strategy(interleaved_i16(#sample_rate.frame_count(), #layout.microphone_stream_channels))]
    pub microphone: Vec<i16>,
    /// Byte offset applied to every ring before the period, so the period
    /// straddles the wrap point at arbitrary (also odd) positions.
    #[strategy(0usize..4096)]
    pub ring_offset: usize,
}

/// Generate one period of interleaved S16 samples.
pub fn interleaved_i16(frames: usize, channels: usize) -> impl Strategy<Value = Vec<i16>> {
    let len = frames * channels;
    proptest::collection::vec(any::<i16>(), len..=len)
}

/// Build an interleaved period where every sample identifies its channel and
/// frame: `channel * 1000 + frame`, wrapping at the S16 range.
pub fn tagged_period(frames: usize, channels: usize) -> Vec<i16> {
    let per_channel: Vec<Vec<i16>> = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|frame| (ch * 1000 + frame) as i16)
                .collect()
        })
        .collect();
    let tables: Vec<&[i16]> = per_channel.iter().map(Vec::as_slice).collect();
    let mut out = vec![0; frames * channels];
    interleave(&tables, frames, &mut out);
    out
}

//! Module configuration.
//!
//! [`ModuleConfig`] is fixed at init. Runtime tuning arrives through the
//! tuning slot instead (see [`crate::tuning`]).

use aec_common_audio::MAX_CHANNELS;

use crate::error::{Error, Result};

/// Default target sample rate.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48_000;

/// Periods per second. One period is 10 ms of audio.
pub const PERIODS_PER_SECOND: u32 = 100;

/// Sample container of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// 16-bit little-endian PCM. The only format the module streams.
    #[default]
    S16Le,
    /// 24-bit PCM in a 32-bit little-endian container.
    S24In32Le,
    /// 32-bit little-endian PCM.
    S32Le,
    /// 32-bit float.
    Float,
}

impl SampleFormat {
    /// Bytes per sample.
    pub fn bytes(self) -> usize {
        match self {
            Self::S16Le => 2,
            Self::S24In32Le | Self::S32Le | Self::Float => 4,
        }
    }
}

/// Stream format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub channels: usize,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub fn new(sample_rate_hz: u32, channels: usize, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate_hz,
            channels,
            sample_format,
        }
    }

    /// 16-bit PCM format with the given rate and channel count.
    pub fn s16(sample_rate_hz: u32, channels: usize) -> Self {
        Self::new(sample_rate_hz, channels, SampleFormat::S16Le)
    }

    /// Bytes of one interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels * self.sample_format.bytes()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::s16(DEFAULT_SAMPLE_RATE_HZ, 2)
    }
}

/// Init-time configuration of the module.
///
/// The capture channel count comes from `base_format`, the reference channel
/// count from `reference_format`. Both size the scratch buffers, so they are
/// also the upper bound for any later reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    /// Rate of every stream and of the engine.
    pub sample_rate_hz: u32,
    /// Bytes of the engine memory arena. Zero means the engine allocates on
    /// its own.
    pub memory_arena_bytes: usize,
    /// Linear capture headroom applied right after the engine is created.
    pub capture_headroom_linear: f32,
    /// Echo path delay applied right after the engine is created.
    pub echo_path_delay_ms: f32,
    /// Format of the microphone and output streams.
    pub base_format: AudioFormat,
    /// Format of the reference stream.
    pub reference_format: AudioFormat,
    /// Format the host declared for the output pin.
    pub output_format: AudioFormat,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            memory_arena_bytes: 0,
            capture_headroom_linear: 1.0,
            echo_path_delay_ms: 0.0,
            base_format: AudioFormat::default(),
            reference_format: AudioFormat::default(),
            output_format: AudioFormat::default(),
        }
    }
}

impl ModuleConfig {
    pub fn builder() -> ModuleConfigBuilder {
        ModuleConfigBuilder::default()
    }

    /// Frames per channel in one period.
    pub fn frame_count(&self) -> usize {
        (self.sample_rate_hz / PERIODS_PER_SECOND) as usize
    }

    /// Configured capture channel count.
    pub fn capture_channels(&self) -> usize {
        self.base_format.channels
    }

    /// Configured reference channel count.
    pub fn reference_channels(&self) -> usize {
        self.reference_format.channels
    }

    /// Check the invariants init relies on.
    pub fn validate(&self) -> Result<()> {
        if self.frame_count() == 0 {
            return Err(Error::InvalidConfig("sample rate below one frame per period"));
        }
        if !(1..=MAX_CHANNELS).contains(&self.capture_channels()) {
            return Err(Error::InvalidConfig("capture channel count out of range"));
        }
        if !(1..=MAX_CHANNELS).contains(&self.reference_channels()) {
            return Err(Error::InvalidConfig("reference channel count out of range"));
        }
        Ok(())
    }
}

/// Builder for [`ModuleConfig`].
#[derive(Debug, Default)]
pub struct ModuleConfigBuilder {
    config: ModuleConfig,
}

impl ModuleConfigBuilder {
    /// Set the target rate. The three stream formats follow it.
    pub fn sample_rate_hz(mut self, rate: u32) -> Self {
        self.config.sample_rate_hz = rate;
        self.config.base_format.sample_rate_hz = rate;
        self.config.reference_format.sample_rate_hz = rate;
        self.config.output_format.sample_rate_hz = rate;
        self
    }

    pub fn memory_arena_bytes(mut self, bytes: usize) -> Self {
        self.config.memory_arena_bytes = bytes;
        self
    }

    pub fn capture_headroom_linear(mut self, headroom: f32) -> Self {
        self.config.capture_headroom_linear = headroom;
        self
    }

    pub fn echo_path_delay_ms(mut self, delay_ms: f32) -> Self {
        self.config.echo_path_delay_ms = delay_ms;
        self
    }

    /// Capture channel count. Sets the base and output formats.
    pub fn capture_channels(mut self, channels: usize) -> Self {
        self.config.base_format.channels = channels;
        self.config.output_format.channels = channels;
        self
    }

    pub fn reference_channels(mut self, channels: usize) -> Self {
        self.config.reference_format.channels = channels;
        self
    }

    pub fn base_format(mut self, format: AudioFormat) -> Self {
        self.config.base_format = format;
        self
    }

    pub fn reference_format(mut self, format: AudioFormat) -> Self {
        self.config.reference_format = format;
        self
    }

    pub fn output_format(mut self, format: AudioFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.config
    }
}

//! Stream role classification and format negotiation at prepare.

use tracing::{debug, error};

use crate::config::{AudioFormat, ModuleConfig, SampleFormat};
use crate::engine::StreamFormats;
use crate::error::{Error, Result, StreamRole};
use crate::stream::{REFERENCE_QUEUE_ID, Sink, Source};

/// Channel shape the module currently runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub sample_rate_hz: u32,
    pub capture_channels: usize,
    pub reference_channels: usize,
    /// Most capture channels a reconfiguration may ask for.
    capture_limit: usize,
}

impl ChannelLayout {
    /// Layout straight from the init configuration. The capture limit is the
    /// scratch capacity until prepare narrows it.
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self {
            sample_rate_hz: config.sample_rate_hz,
            capture_channels: config.capture_channels(),
            reference_channels: config.reference_channels(),
            capture_limit: config.capture_channels(),
        }
    }

    pub fn capture_limit(&self) -> usize {
        self.capture_limit
    }

    /// Engine stream shape for the current layout.
    pub fn stream_formats(&self) -> StreamFormats {
        self.stream_formats_with(self.capture_channels)
    }

    /// Engine stream shape with a different capture channel count.
    pub fn stream_formats_with(&self, capture_channels: usize) -> StreamFormats {
        StreamFormats {
            capture_sample_rate_hz: self.sample_rate_hz,
            capture_input_channels: capture_channels,
            capture_output_channels: capture_channels,
            reference_sample_rate_hz: self.sample_rate_hz,
            reference_channels: self.reference_channels,
        }
    }

    /// Check a requested capture channel count against the limit.
    pub fn check_capture(&self, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(Error::InvalidConfig("capture channel count must be non-zero"));
        }
        if channels > self.capture_limit {
            return Err(Error::ChannelCapacity {
                requested: channels,
                capacity: self.capture_limit,
            });
        }
        Ok(())
    }
}

/// Indices of the reference and microphone streams among the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRoles {
    pub reference: usize,
    pub microphone: usize,
}

impl StreamRoles {
    /// Classify two sources by queue identity.
    pub fn classify(sources: &[&mut dyn Source]) -> Result<Self> {
        let [first, second] = sources else {
            return Err(Error::InvalidTopology {
                sources: sources.len(),
                sinks: 1,
            });
        };
        let roles = match (
            first.queue_id() == REFERENCE_QUEUE_ID,
            second.queue_id() == REFERENCE_QUEUE_ID,
        ) {
            (true, false) => Self {
                reference: 0,
                microphone: 1,
            },
            (false, true) => Self {
                reference: 1,
                microphone: 0,
            },
            _ => {
                error!(
                    first = first.queue_id(),
                    second = second.queue_id(),
                    "need exactly one reference source"
                );
                return Err(Error::InvalidTopology {
                    sources: 2,
                    sinks: 1,
                });
            }
        };
        debug!(
            reference = roles.reference,
            microphone = roles.microphone,
            "stream roles resolved"
        );
        Ok(roles)
    }
}

/// Require exactly two sources and one sink.
pub fn check_topology(sources: usize, sinks: usize) -> Result<()> {
    if sources != 2 || sinks != 1 {
        error!(sources, sinks, "invalid number of sources or sinks");
        return Err(Error::InvalidTopology { sources, sinks });
    }
    Ok(())
}

/// Classify the sources, pin every stream's format, validate the bound
/// streams, and narrow the layout's capture limit to what the streams carry.
pub fn negotiate(
    config: &ModuleConfig,
    layout: &mut ChannelLayout,
    capture_capacity: usize,
    sources: &mut [&mut dyn Source],
    sinks: &mut [&mut dyn Sink],
) -> Result<StreamRoles> {
    check_topology(sources.len(), sinks.len())?;
    let roles = StreamRoles::classify(sources)?;

    // Rate and sample format are pinned. Channel counts stay the stream's own.
    let pin = |target: AudioFormat, channels: usize| AudioFormat { channels, ..target };
    let reference_format = pin(config.reference_format, sources[roles.reference].channels());
    sources[roles.reference].set_format(&reference_format);
    let microphone_format = pin(config.base_format, sources[roles.microphone].channels());
    sources[roles.microphone].set_format(&microphone_format);
    let output_format = pin(config.base_format, sinks[0].channels());
    sinks[0].set_format(&output_format);

    let reference = &*sources[roles.reference];
    let microphone = &*sources[roles.microphone];
    let output = &*sinks[0];

    check_channels(StreamRole::Reference, reference.channels(), layout.reference_channels)?;
    check_channels(StreamRole::Microphone, microphone.channels(), layout.capture_channels)?;
    check_channels(StreamRole::Output, output.channels(), layout.capture_channels)?;

    let streams = [
        (StreamRole::Reference, reference.format()),
        (StreamRole::Microphone, microphone.format()),
        (StreamRole::Output, output.format()),
    ];
    for (role, format) in streams {
        if format.sample_format != SampleFormat::S16Le {
            error!(%role, format = ?format.sample_format, "unsupported data format");
            return Err(Error::UnsupportedFormat {
                role,
                format: format.sample_format,
            });
        }
    }
    for (role, format) in streams {
        if format.sample_rate_hz != layout.sample_rate_hz {
            error!(
                %role,
                rate = format.sample_rate_hz,
                expected = layout.sample_rate_hz,
                "unsupported sample rate"
            );
            return Err(Error::UnsupportedRate {
                role,
                rate: format.sample_rate_hz,
                expected: layout.sample_rate_hz,
            });
        }
    }

    let frames = config.frame_count();
    check_buffering(
        StreamRole::Microphone,
        microphone.min_available(),
        frames * microphone.frame_bytes(),
    )?;
    check_buffering(
        StreamRole::Output,
        output.min_free_space(),
        frames * output.frame_bytes(),
    )?;
    check_buffering(
        StreamRole::Reference,
        reference.min_available(),
        frames * reference.frame_bytes(),
    )?;

    layout.capture_limit = capture_capacity
        .min(microphone.channels())
        .min(output.channels());
    debug!(
        capture_limit = layout.capture_limit,
        reference_stream_channels = reference.channels(),
        "stream formats negotiated"
    );
    Ok(roles)
}

fn check_channels(role: StreamRole, channels: usize, required: usize) -> Result<()> {
    if channels < required {
        error!(%role, channels, required, "unsupported number of channels");
        return Err(Error::UnsupportedChannels {
            role,
            channels,
            required,
        });
    }
    Ok(())
}

fn check_buffering(role: StreamRole, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        error!(%role, actual, expected, "incorrect period size");
        return Err(Error::BufferingMismatch {
            role,
            actual,
            expected,
        });
    }
    Ok(())
}

//! Tuning message decoding.
//!
//! A tuning blob decodes into a [`TuningUpdate`] of five independently
//! optional fields. [`TlvParser`] reads the default layout, a sequence of
//! little-endian entries:
//!
//! ```text
//! [ tag: u32 | length: u32 | value: length bytes | pad to 4 bytes ] ...
//! ```
//!
//! | Tag | Field                   | Value         |
//! |-----|-------------------------|---------------|
//! | 1   | engine configuration    | opaque bytes  |
//! | 2   | capture input channels  | `u32`         |
//! | 3   | capture output channels | `u32`         |
//! | 4   | reference delay (ms)    | `f32`         |
//! | 5   | microphone gain         | `f32`         |
//!
//! Unknown tags are skipped. [`TuningMessage`] writes the same layout.

pub const TAG_ENGINE_CONFIG: u32 = 1;
pub const TAG_CAPTURE_INPUT_CHANNELS: u32 = 2;
pub const TAG_CAPTURE_OUTPUT_CHANNELS: u32 = 3;
pub const TAG_REFERENCE_DELAY_MS: u32 = 4;
pub const TAG_MIC_GAIN: u32 = 5;

const HEADER_BYTES: usize = 8;
const ALIGN: usize = 4;

/// A tuning payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// An entry header or value runs past the end of the payload.
    #[error("tuning message truncated at byte {offset}")]
    Truncated { offset: usize },
    /// A scalar field has the wrong size.
    #[error("tuning entry {tag} has length {len}, expected {expected}")]
    BadLength { tag: u32, len: usize, expected: usize },
}

/// Decoded tuning payload. Absent fields mean "no change".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TuningUpdate<'a> {
    /// Native engine configuration, forwarded verbatim.
    pub engine_config: Option<&'a [u8]>,
    pub capture_input_channels: Option<u32>,
    pub capture_output_channels: Option<u32>,
    pub reference_delay_ms: Option<f32>,
    /// Linear microphone gain, applied as capture headroom.
    pub mic_gain: Option<f32>,
}

impl TuningUpdate<'_> {
    /// Whether the update carries no field at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Decodes a tuning blob.
pub trait MessageParser: Send {
    fn parse<'a>(&self, blob: &'a [u8]) -> Result<TuningUpdate<'a>, ParseError>;
}

/// Parser for the default tag/length/value layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlvParser;

impl MessageParser for TlvParser {
    fn parse<'a>(&self, blob: &'a [u8]) -> Result<TuningUpdate<'a>, ParseError> {
        let mut update = TuningUpdate::default();
        let mut offset = 0;
        while offset < blob.len() {
            let header = blob
                .get(offset..offset + HEADER_BYTES)
                .ok_or(ParseError::Truncated { offset })?;
            let tag = read_u32(&header[..4]);
            let len = read_u32(&header[4..]) as usize;
            let value_start = offset + HEADER_BYTES;
            let value = value_start
                .checked_add(len)
                .and_then(|end| blob.get(value_start..end))
                .ok_or(ParseError::Truncated { offset })?;

            match tag {
                TAG_ENGINE_CONFIG => update.engine_config = Some(value),
                TAG_CAPTURE_INPUT_CHANNELS => {
                    update.capture_input_channels = Some(read_u32(scalar(tag, value)?));
                }
                TAG_CAPTURE_OUTPUT_CHANNELS => {
                    update.capture_output_channels = Some(read_u32(scalar(tag, value)?));
                }
                TAG_REFERENCE_DELAY_MS => {
                    update.reference_delay_ms = Some(read_f32(scalar(tag, value)?));
                }
                TAG_MIC_GAIN => update.mic_gain = Some(read_f32(scalar(tag, value)?)),
                _ => {}
            }

            offset = (value_start + len).next_multiple_of(ALIGN);
        }
        Ok(update)
    }
}

fn scalar(tag: u32, value: &[u8]) -> Result<&[u8], ParseError> {
    if value.len() != 4 {
        return Err(ParseError::BadLength {
            tag,
            len: value.len(),
            expected: 4,
        });
    }
    Ok(value)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_bits(read_u32(bytes))
}

/// Encoder for the default layout.
#[derive(Debug, Clone, Default)]
pub struct TuningMessage {
    bytes: Vec<u8>,
}

impl TuningMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine_config(self, config: &[u8]) -> Self {
        self.entry(TAG_ENGINE_CONFIG, config)
    }

    pub fn capture_input_channels(self, channels: u32) -> Self {
        self.entry(TAG_CAPTURE_INPUT_CHANNELS, &channels.to_le_bytes())
    }

    pub fn capture_output_channels(self, channels: u32) -> Self {
        self.entry(TAG_CAPTURE_OUTPUT_CHANNELS, &channels.to_le_bytes())
    }

    /// Set both capture channel counts.
    pub fn capture_channels(self, channels: u32) -> Self {
        self.capture_input_channels(channels)
            .capture_output_channels(channels)
    }

    pub fn reference_delay_ms(self, delay_ms: f32) -> Self {
        self.entry(TAG_REFERENCE_DELAY_MS, &delay_ms.to_le_bytes())
    }

    pub fn mic_gain(self, gain: f32) -> Self {
        self.entry(TAG_MIC_GAIN, &gain.to_le_bytes())
    }

    /// Append a raw entry.
    pub fn entry(mut self, tag: u32, value: &[u8]) -> Self {
        self.bytes.extend_from_slice(&tag.to_le_bytes());
        self.bytes
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(value);
        let padded = self.bytes.len().next_multiple_of(ALIGN);
        self.bytes.resize(padded, 0);
        self
    }

    pub fn encode(self) -> Vec<u8> {
        self.bytes
    }
}

//! Sample format conversions between the 16-bit transport and the engine.
//!
//! # Format conventions
//!
//! | Name      | Type    | Range                          |
//! |-----------|---------|--------------------------------|
//! | S16       | `i16`   | \[-32768, 32767\]              |
//! | Float     | `f32`   | \[-1.0, 1.0)                   |
//!
//! Streams always carry S16 little-endian. The engine works in whichever
//! [`EngineSample`] type it declares; the conversion is a fixed linear scale
//! and is lossy for `f32` (truncation toward zero on the way back).

/// Scale between S16 and Float.
pub const S16_SCALE: f32 = 32768.0;

/// Size in bytes of one S16 sample on the wire.
pub const S16_BYTES: usize = 2;

/// Numeric representation used at the engine boundary.
///
/// Implemented for `i16` (fixed-point engine API) and `f32` (floating-point
/// engine API).
pub trait EngineSample: Copy + Default + Send + Sync + 'static {
    /// Convert one transport sample into the engine representation.
    fn from_s16(v: i16) -> Self;

    /// Convert one engine sample back into the transport representation.
    fn to_s16(self) -> i16;
}

impl EngineSample for i16 {
    #[inline]
    fn from_s16(v: i16) -> Self {
        v
    }

    #[inline]
    fn to_s16(self) -> i16 {
        self
    }
}

impl EngineSample for f32 {
    #[inline]
    fn from_s16(v: i16) -> Self {
        s16_to_float(v)
    }

    #[inline]
    fn to_s16(self) -> i16 {
        float_to_s16_trunc(self)
    }
}

/// Convert a single S16 sample to Float \[-1.0, 1.0).
#[inline]
pub fn s16_to_float(v: i16) -> f32 {
    f32::from(v) / S16_SCALE
}

/// Convert a single Float sample to S16, truncating toward zero.
///
/// Out-of-range input saturates (`as` casts from float saturate).
#[inline]
pub fn float_to_s16_trunc(v: f32) -> i16 {
    (v * S16_SCALE) as i16
}

/// Read one little-endian S16 sample at byte `pos` of a circular `region`.
///
/// The second byte wraps to the start of `region` if `pos` is its last byte.
#[inline]
pub fn read_s16_le(region: &[u8], pos: usize) -> i16 {
    let lo = region[pos];
    let hi = region[(pos + 1) % region.len()];
    i16::from_le_bytes([lo, hi])
}

/// Write one little-endian S16 sample at byte `pos` of a circular `region`.
#[inline]
pub fn write_s16_le(region: &mut [u8], pos: usize, v: i16) {
    let len = region.len();
    let [lo, hi] = v.to_le_bytes();
    region[pos] = lo;
    region[(pos + 1) % len] = hi;
}

/// Interleave `frames` frames of `src` channels into `dest`.
///
/// # Panics
///
/// Panics if `dest` is shorter than `frames * src.len()` or a channel is
/// shorter than `frames`.
pub fn interleave<T: Copy>(src: &[&[T]], frames: usize, dest: &mut [T]) {
    let channels = src.len();
    assert!(dest.len() >= frames * channels, "destination too short");
    for (ch, samples) in src.iter().enumerate() {
        for (i, &s) in samples[..frames].iter().enumerate() {
            dest[i * channels + ch] = s;
        }
    }
}

/// De-interleave `frames` frames of `src` into one slice per channel.
///
/// # Panics
///
/// Panics if `src` is shorter than `frames * dest.len()` or a channel is
/// shorter than `frames`.
pub fn deinterleave<T: Copy>(src: &[T], frames: usize, dest: &mut [&mut [T]]) {
    let channels = dest.len();
    assert!(src.len() >= frames * channels, "source too short");
    for (ch, samples) in dest.iter_mut().enumerate() {
        for (i, s) in samples[..frames].iter_mut().enumerate() {
            *s = src[i * channels + ch];
        }
    }
}

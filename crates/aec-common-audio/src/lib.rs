//! Audio primitives shared by the AEC module.
//!
//! Contains the transport/engine sample conversions and the channel-major
//! scratch buffer the streaming loop fills every period.

pub mod audio_util;
pub mod channel_buffer;

pub use audio_util::EngineSample;
pub use channel_buffer::{ChannelBuffer, MAX_CHANNELS};

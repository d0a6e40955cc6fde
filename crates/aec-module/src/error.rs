//! Error taxonomy for the module.
//!
//! Every failure a host can observe is an [`Error`]. Hosts that speak the
//! pipeline's C-style status codes use [`Error::errno`].

use std::collections::TryReserveError;
use std::fmt;

use crate::config::SampleFormat;
use crate::engine::{EngineError, EngineOperation};
use crate::message::ParseError;
use crate::stream::StreamError;

const ENOMEM: i32 = 12;
const EINVAL: i32 = 22;
const EIO: i32 = 5;

/// Which of the three bound streams an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Loudspeaker feedback fed to the engine as the echo reference.
    Reference,
    /// Raw microphone capture.
    Microphone,
    /// Echo-cancelled output.
    Output,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Microphone => write!(f, "microphone"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Errors returned by module operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An allocation failed during init. The module never became usable.
    #[error("failed to allocate {what}")]
    ResourceExhausted {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// The module configuration or a tuning payload is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Wrong number of sources or sinks, or the sources do not carry exactly
    /// one reference and one microphone.
    #[error("invalid topology: {sources} sources, {sinks} sinks")]
    InvalidTopology { sources: usize, sinks: usize },

    /// A tuning blob asked for different capture input and output counts.
    #[error("capture input channels ({input}) differ from output channels ({output})")]
    ChannelMismatch { input: u32, output: u32 },

    /// A tuning blob asked for more capture channels than the module can
    /// carry.
    #[error("{requested} capture channels requested, at most {capacity} supported")]
    ChannelCapacity { requested: usize, capacity: usize },

    /// A stream carries fewer channels than the module consumes.
    #[error("unsupported number of {role} channels: {channels}, need at least {required}")]
    UnsupportedChannels {
        role: StreamRole,
        channels: usize,
        required: usize,
    },

    /// A stream's sample format is not 16-bit PCM.
    #[error("unsupported {role} data format: {format:?}")]
    UnsupportedFormat {
        role: StreamRole,
        format: SampleFormat,
    },

    /// A stream's rate differs from the module's target rate.
    #[error("unsupported {role} sample rate: {rate} Hz, expected {expected} Hz")]
    UnsupportedRate {
        role: StreamRole,
        rate: u32,
        expected: u32,
    },

    /// A stream's period size does not match one period of frames.
    #[error("incorrect {role} period size: {actual} bytes, expected {expected}")]
    BufferingMismatch {
        role: StreamRole,
        actual: usize,
        expected: usize,
    },

    /// Switch and enum controls are rejected; only binary blobs are accepted.
    #[error("only binary controls are supported (param id {param_id})")]
    UnsupportedControl { param_id: u32 },

    /// The operation is not implemented by this module.
    #[error("operation not supported")]
    Unsupported,

    /// `process` was called outside the prepared state.
    #[error("module is not prepared")]
    NotPrepared,

    /// The tuning payload could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The engine rejected an update; its previous configuration stays active.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A stream refused an acquire or release during the streaming loop.
    #[error("{role} stream failure")]
    Stream {
        role: StreamRole,
        #[source]
        source: StreamError,
    },
}

impl Error {
    /// Negative errno-style status code for C-style hosts.
    pub fn errno(&self) -> i32 {
        match self {
            Self::ResourceExhausted { .. } => -ENOMEM,
            Self::Stream { .. } => -EIO,
            Self::Engine(e) if e.operation == EngineOperation::Create => -EINVAL,
            Self::Engine(e) if e.code < 0 => e.code,
            _ => -EINVAL,
        }
    }

    /// Whether the error belongs to the invalid-configuration class.
    ///
    /// An engine that cannot be created for the configured formats counts as
    /// an invalid configuration.
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::InvalidTopology { .. }
                | Self::ChannelMismatch { .. }
                | Self::ChannelCapacity { .. }
                | Self::UnsupportedChannels { .. }
                | Self::UnsupportedFormat { .. }
                | Self::UnsupportedRate { .. }
                | Self::UnsupportedControl { .. }
                | Self::Parse(_)
                | Self::Engine(EngineError {
                    operation: EngineOperation::Create,
                    ..
                })
        )
    }
}

/// Result alias for module operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Acoustic echo cancellation stage for fixed-period streaming pipelines.
//!
//! An [`AecModule`] binds two sources (the far-end reference and the
//! microphone) and one sink, and once per 10 ms period feeds the reference to
//! an [`EchoCanceller`], runs it over the microphone block, and writes the
//! echo-cancelled capture to the sink. The engine itself is pluggable through
//! [`EngineFactory`]; its sample representation is chosen by
//! [`EchoCanceller::Sample`].
//!
//! Tuning arrives as binary control writes, possibly fragmented and from
//! another thread, and is applied at the next period boundary. See
//! [`TuningWriter`] and [`TuningMessage`].
//!
//! ```ignore
//! let config = ModuleConfig::builder()
//!     .sample_rate_hz(16_000)
//!     .capture_channels(2)
//!     .reference_channels(2)
//!     .build();
//! let mut module = AecModule::init(config, factory)?;
//! module.prepare(&mut [&mut reference, &mut microphone], &mut [&mut output])?;
//! loop {
//!     module.process(&mut [&mut reference, &mut microphone], &mut [&mut output])?;
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod message;
pub mod module;
pub mod reconfigure;
pub mod ring_stream;
pub mod stats;
pub mod stream;
pub mod streaming;
pub mod tuning;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{AudioFormat, ModuleConfig, ModuleConfigBuilder, SampleFormat};
pub use engine::{EchoCanceller, EngineError, EngineFactory, MemoryArena, StreamFormats};
pub use error::{Error, Result, StreamRole};
pub use message::{MessageParser, ParseError, TlvParser, TuningMessage, TuningUpdate};
pub use module::{AecModule, LifecycleState, ProcessingModule};
pub use ring_stream::{RingSink, RingSource};
pub use stats::ModuleStats;
pub use stream::{Sink, Source, StreamError};
pub use tuning::{FragmentPosition, Publication, TuningWriter};

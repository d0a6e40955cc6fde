//! Echo-canceller engine seam.
//!
//! The module never implements echo cancellation itself. It drives an
//! [`EchoCanceller`] built by an [`EngineFactory`] and owns the result
//! through an [`EngineHandle`], which tears the engine down before handing
//! the memory arena back.

use std::collections::TryReserveError;
use std::fmt;

use aec_common_audio::EngineSample;
use derive_more::Debug;
use tracing::debug;

/// Stream shape the engine processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormats {
    pub capture_sample_rate_hz: u32,
    pub capture_input_channels: usize,
    pub capture_output_channels: usize,
    pub reference_sample_rate_hz: u32,
    pub reference_channels: usize,
}

/// Engine entry point that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    Create,
    Reconfigure,
    SetStreamFormats,
    SetParameters,
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Reconfigure => write!(f, "reconfigure"),
            Self::SetStreamFormats => write!(f, "set stream formats"),
            Self::SetParameters => write!(f, "set parameters"),
        }
    }
}

/// An engine rejected an operation. `code` is the engine's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("echo canceller failed to {operation} (code {code})")]
pub struct EngineError {
    pub operation: EngineOperation,
    pub code: i32,
}

impl EngineError {
    pub fn new(operation: EngineOperation, code: i32) -> Self {
        Self { operation, code }
    }
}

/// Preallocated memory the engine may carve its state from.
#[derive(Debug)]
pub struct MemoryArena {
    #[debug(skip)]
    bytes: Box<[u8]>,
}

impl MemoryArena {
    /// Allocate `size` zeroed bytes, reporting failure instead of aborting.
    pub fn try_new(size: usize) -> Result<Self, TryReserveError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size)?;
        bytes.resize(size, 0);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// An echo-canceller instance.
///
/// Channel tables are channel-major: one slice of `frame_count` samples per
/// channel. `Sample` fixes the numeric representation at compile time.
pub trait EchoCanceller: Send {
    type Sample: EngineSample;

    /// Apply an opaque native configuration blob.
    fn reconfigure(&mut self, config: &[u8]) -> Result<(), EngineError>;

    /// Change the stream shape.
    fn set_stream_formats(&mut self, formats: &StreamFormats) -> Result<(), EngineError>;

    /// Update capture headroom and echo path delay. `None` means no change.
    fn set_parameters(
        &mut self,
        capture_headroom_linear: Option<f32>,
        echo_path_delay_ms: Option<f32>,
    ) -> Result<(), EngineError>;

    /// Feed one period of loudspeaker reference.
    fn analyze_render(&mut self, reference: &[&[Self::Sample]]);

    /// Cancel echo from one period of capture, in place.
    fn process_capture(&mut self, capture: &mut [&mut [Self::Sample]]);
}

/// Builds engines and lends them a memory arena.
pub trait EngineFactory {
    type Engine: EchoCanceller;

    /// Hand the arena to the engine library. Called before [`create`] when
    /// an arena is configured.
    ///
    /// [`create`]: EngineFactory::create
    fn attach_memory(&mut self, arena: MemoryArena);

    /// Take the arena back after every engine created from it is gone.
    fn detach_memory(&mut self) -> Option<MemoryArena>;

    fn create(&mut self, formats: &StreamFormats) -> Result<Self::Engine, EngineError>;
}

/// Sample type of the engines a factory builds.
pub type SampleOf<F> = <<F as EngineFactory>::Engine as EchoCanceller>::Sample;

/// Owned engine instance plus the factory it came from.
///
/// Dropping the handle destroys the engine first, then detaches the arena.
pub struct EngineHandle<F: EngineFactory> {
    engine: F::Engine,
    attachment: Attachment<F>,
}

struct Attachment<F: EngineFactory> {
    factory: F,
    arena_bytes: Option<usize>,
}

impl<F: EngineFactory> fmt::Debug for EngineHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("arena_bytes", &self.attachment.arena_bytes)
            .finish_non_exhaustive()
    }
}

impl<F: EngineFactory> Drop for Attachment<F> {
    fn drop(&mut self) {
        if let Some(bytes) = self.arena_bytes {
            drop(self.factory.detach_memory());
            debug!(bytes, "engine memory arena detached");
        }
    }
}

impl<F: EngineFactory> EngineHandle<F> {
    /// Attach `arena` (if any) and create an engine.
    ///
    /// On failure the arena is detached again before returning.
    pub fn create(
        factory: F,
        formats: &StreamFormats,
        arena: Option<MemoryArena>,
    ) -> Result<Self, EngineError> {
        let mut attachment = Attachment {
            factory,
            arena_bytes: None,
        };
        if let Some(arena) = arena {
            let bytes = arena.len();
            attachment.factory.attach_memory(arena);
            attachment.arena_bytes = Some(bytes);
            debug!(bytes, "engine memory arena attached");
        }
        let engine = attachment.factory.create(formats)?;
        Ok(Self { engine, attachment })
    }

    pub fn engine(&self) -> &F::Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut F::Engine {
        &mut self.engine
    }

    /// Size of the attached arena, if one was attached.
    pub fn arena_bytes(&self) -> Option<usize> {
        self.attachment.arena_bytes
    }
}

//! The AEC processing module and its lifecycle.
//!
//! [`AecModule::init`] is the constructor and [`ProcessingModule::free`]
//! consumes the module, so an uninitialized or double-freed module cannot be
//! expressed. Between the two the module moves through
//! [`LifecycleState`]: prepare binds and validates the streams, process runs
//! one period per call, reset parks the module until the next prepare.

use std::fmt;
use std::time::Instant;

use aec_common_audio::ChannelBuffer;
use tracing::{debug, error, info, trace};

use crate::config::ModuleConfig;
use crate::engine::{EchoCanceller, EngineFactory, EngineHandle, MemoryArena, SampleOf};
use crate::error::{Error, Result};
use crate::format::{ChannelLayout, StreamRoles, check_topology, negotiate};
use crate::message::{MessageParser, TlvParser};
use crate::reconfigure::{Outcome, Reconfigurator};
use crate::stats::ModuleStats;
use crate::stream::{Sink, Source};
use crate::streaming::Period;
use crate::tuning::{FragmentPosition, ParamId, Publication, TuningWriter};

/// Lifecycle callbacks the pipeline framework drives.
pub trait ProcessingModule {
    /// Bind two sources (reference and microphone, any order) and one sink.
    fn prepare(&mut self, sources: &mut [&mut dyn Source], sinks: &mut [&mut dyn Sink])
    -> Result<()>;

    /// Run one period.
    fn process(&mut self, sources: &mut [&mut dyn Source], sinks: &mut [&mut dyn Sink])
    -> Result<()>;

    fn reset(&mut self) -> Result<()>;

    /// Store one fragment of a binary control write.
    fn set_configuration(
        &mut self,
        param_id: u32,
        position: FragmentPosition,
        data_offset_size: usize,
        fragment: &[u8],
    ) -> Result<()>;

    /// Read back a control. Returns the bytes written into `fragment`.
    fn get_configuration(&self, param_id: u32, fragment: &mut [u8]) -> Result<usize>;

    /// Tear the module down.
    fn free(self)
    where
        Self: Sized;
}

/// Where the module is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Prepared,
    Processing,
    Reset,
}

/// Acoustic echo cancellation stage.
pub struct AecModule<F: EngineFactory, P: MessageParser = TlvParser> {
    engine: EngineHandle<F>,
    config: ModuleConfig,
    state: LifecycleState,
    frame_count: usize,
    layout: ChannelLayout,
    roles: Option<StreamRoles>,
    reference_scratch: ChannelBuffer<SampleOf<F>>,
    capture_scratch: ChannelBuffer<SampleOf<F>>,
    reconfig: Reconfigurator<P>,
    writer: TuningWriter,
    stats: ModuleStats,
}

impl<F: EngineFactory, P: MessageParser> fmt::Debug for AecModule<F, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AecModule")
            .field("state", &self.state)
            .field("frame_count", &self.frame_count)
            .field("layout", &self.layout)
            .field("roles", &self.roles)
            .field("pending_reconfigure", &self.reconfig.is_pending())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<F: EngineFactory> AecModule<F, TlvParser> {
    /// Create a module that decodes tuning blobs with [`TlvParser`].
    pub fn init(config: ModuleConfig, factory: F) -> Result<Self> {
        Self::with_parser(config, factory, TlvParser)
    }
}

impl<F: EngineFactory, P: MessageParser> AecModule<F, P> {
    /// Create a module with a custom tuning message parser.
    ///
    /// Anything allocated before a failure is released again before the
    /// error is returned.
    pub fn with_parser(config: ModuleConfig, factory: F, parser: P) -> Result<Self> {
        config.validate().inspect_err(|e| {
            error!(error = %e, "rejected module configuration");
        })?;

        let reconfig = Reconfigurator::new(parser);
        let writer = reconfig.writer();
        let frame_count = config.frame_count();
        let layout = ChannelLayout::from_config(&config);
        info!(
            sample_rate_hz = config.sample_rate_hz,
            frame_count,
            capture_channels = layout.capture_channels,
            reference_channels = layout.reference_channels,
            output_channels = config.output_format.channels,
            "initializing AEC module"
        );

        let arena = match config.memory_arena_bytes {
            0 => None,
            bytes => Some(MemoryArena::try_new(bytes).map_err(|source| {
                error!(bytes, "failed to allocate engine memory arena");
                Error::ResourceExhausted {
                    what: "engine memory arena",
                    source,
                }
            })?),
        };

        let mut engine = EngineHandle::create(factory, &layout.stream_formats(), arena)
            .inspect_err(|e| error!(code = e.code, "failed to create echo canceller"))?;
        debug!(arena_bytes = ?engine.arena_bytes(), "echo canceller created");
        engine
            .engine_mut()
            .set_parameters(
                Some(config.capture_headroom_linear),
                Some(config.echo_path_delay_ms),
            )
            .inspect_err(|e| error!(code = e.code, "failed to apply default parameters"))?;

        let capture_scratch = scratch(frame_count, layout.capture_channels, "capture scratch")?;
        let reference_scratch =
            scratch(frame_count, layout.reference_channels, "reference scratch")?;

        info!("AEC module initialized");
        Ok(Self {
            engine,
            config,
            state: LifecycleState::Initialized,
            frame_count,
            layout,
            roles: None,
            reference_scratch,
            capture_scratch,
            reconfig,
            writer,
            stats: ModuleStats::default(),
        })
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Frames per channel in one period.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn capture_channels(&self) -> usize {
        self.layout.capture_channels
    }

    pub fn reference_channels(&self) -> usize {
        self.layout.reference_channels
    }

    /// Stream roles resolved by the last prepare.
    pub fn roles(&self) -> Option<StreamRoles> {
        self.roles
    }

    pub fn is_reconfigure_pending(&self) -> bool {
        self.reconfig.is_pending()
    }

    pub fn stats(&self) -> &ModuleStats {
        &self.stats
    }

    pub fn engine(&self) -> &F::Engine {
        self.engine.engine()
    }

    /// A writer for another context to publish tuning blobs through.
    ///
    /// Blobs published this way are picked up at the start of the next
    /// period.
    pub fn tuning_writer(&self) -> TuningWriter {
        self.reconfig.writer()
    }

    fn reconfigure(&mut self) -> Result<()> {
        self.reconfig.poll();
        match self.reconfig.attempt(
            self.engine.engine_mut(),
            &mut self.layout,
            &mut self.capture_scratch,
        ) {
            Ok(Outcome::Applied) => {
                self.stats.reconfigurations_applied += 1;
                Ok(())
            }
            Ok(Outcome::Idle) => Ok(()),
            Err(e) => {
                self.stats.reconfiguration_failures += 1;
                Err(e)
            }
        }
    }
}

fn scratch<S: Clone + Default>(
    frames: usize,
    channels: usize,
    what: &'static str,
) -> Result<ChannelBuffer<S>> {
    let buffer = ChannelBuffer::try_new(frames, channels).map_err(|source| {
        error!(frames, channels, what, "failed to allocate scratch buffer");
        Error::ResourceExhausted { what, source }
    })?;
    debug!(frames, channels, what, "scratch buffer allocated");
    Ok(buffer)
}

impl<F: EngineFactory, P: MessageParser> ProcessingModule for AecModule<F, P> {
    fn prepare(
        &mut self,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<()> {
        debug!(state = ?self.state, "preparing AEC module");
        let roles = negotiate(
            &self.config,
            &mut self.layout,
            self.capture_scratch.num_allocated_channels(),
            sources,
            sinks,
        )?;
        self.roles = Some(roles);
        self.reconfigure()?;
        self.state = LifecycleState::Prepared;
        info!(
            capture_channels = self.layout.capture_channels,
            reference_channels = self.layout.reference_channels,
            "AEC module prepared"
        );
        Ok(())
    }

    fn process(
        &mut self,
        sources: &mut [&mut dyn Source],
        sinks: &mut [&mut dyn Sink],
    ) -> Result<()> {
        let roles = match (self.state, self.roles) {
            (LifecycleState::Prepared | LifecycleState::Processing, Some(roles)) => roles,
            (state, _) => {
                error!(?state, "process called on a module that is not prepared");
                return Err(Error::NotPrepared);
            }
        };
        check_topology(sources.len(), sinks.len())?;
        let started = Instant::now();

        self.reconfigure()?;

        let (first, second) = sources.split_at_mut(1);
        let (reference, microphone) = if roles.reference == 0 {
            (&mut *first[0], &mut *second[0])
        } else {
            (&mut *second[0], &mut *first[0])
        };
        let period = Period {
            engine: self.engine.engine_mut(),
            frames: self.frame_count,
            reference_scratch: &mut self.reference_scratch,
            capture_scratch: &mut self.capture_scratch,
        };
        if let Err(e) = period.run(reference, microphone, &mut *sinks[0]) {
            if matches!(e, Error::Stream { .. }) {
                self.stats.stream_failures += 1;
            }
            error!(error = %e, "period aborted");
            return Err(e);
        }

        self.state = LifecycleState::Processing;
        let elapsed = started.elapsed();
        self.stats.record_period(elapsed);
        trace!(
            elapsed_us = elapsed.as_micros() as u64,
            period = self.stats.periods_processed,
            "period processed"
        );
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        info!(state = ?self.state, "resetting AEC module");
        self.reference_scratch.clear();
        self.capture_scratch.clear();
        self.state = LifecycleState::Reset;
        Ok(())
    }

    fn set_configuration(
        &mut self,
        param_id: u32,
        position: FragmentPosition,
        data_offset_size: usize,
        fragment: &[u8],
    ) -> Result<()> {
        match ParamId::from(param_id) {
            ParamId::Switch | ParamId::Enum => {
                error!(param_id, "only binary controls are supported");
                return Err(Error::UnsupportedControl { param_id });
            }
            ParamId::Binary(_) => {}
        }

        let publication = self
            .writer
            .write_fragment(position, data_offset_size, fragment)?;
        if publication == Publication::Published {
            // Accept the blob right away so back-to-back writes do not fail.
            self.reconfig.poll();
            info!(
                bytes = self.reconfig.current().map_or(0, |b| b.len()),
                "tuning blob accepted"
            );
        }
        Ok(())
    }

    fn get_configuration(&self, param_id: u32, _fragment: &mut [u8]) -> Result<usize> {
        error!(param_id, "reading configuration is not supported");
        Err(Error::Unsupported)
    }

    fn free(self) {
        info!(
            periods = self.stats.periods_processed,
            "freeing AEC module"
        );
        drop(self);
    }
}

//! Shared test fixtures: a recording engine double and stream sets.

use std::num::NonZero;
use std::sync::{Arc, Mutex};

use aec_common_audio::EngineSample;

use crate::config::{AudioFormat, ModuleConfig};
use crate::engine::{
    EchoCanceller, EngineError, EngineFactory, EngineOperation, MemoryArena, StreamFormats,
};
use crate::error::StreamRole;
use crate::ring_stream::{RingSink, RingSource};
use crate::stream::{MICROPHONE_QUEUE_ID, REFERENCE_QUEUE_ID, Sink, Source};

/// Periods of headroom in every test queue.
const QUEUE_PERIODS: usize = 4;

pub(crate) fn test_config(rate: u32, capture: usize, reference: usize) -> ModuleConfig {
    ModuleConfig::builder()
        .sample_rate_hz(rate)
        .capture_channels(capture)
        .reference_channels(reference)
        .build()
}

pub(crate) fn default_formats() -> StreamFormats {
    StreamFormats {
        capture_sample_rate_hz: 16_000,
        capture_input_channels: 2,
        capture_output_channels: 2,
        reference_sample_rate_hz: 16_000,
        reference_channels: 2,
    }
}

/// Engine entry points that should fail, with the code to report.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Failures {
    pub create: Option<i32>,
    pub reconfigure: Option<i32>,
    pub set_stream_formats: Option<i32>,
    pub set_parameters: Option<i32>,
}

/// Everything the engine double saw.
#[derive(Debug)]
pub(crate) struct EngineLog<S> {
    /// Lifecycle events in order: attach, create, destroy, detach.
    pub events: Vec<&'static str>,
    pub arena_attached: usize,
    pub arena_detached: usize,
    pub created: usize,
    pub destroyed: usize,
    pub created_with: Option<StreamFormats>,
    pub reconfigure_blobs: Vec<Vec<u8>>,
    /// Accepted `set_stream_formats` calls.
    pub formats: Vec<StreamFormats>,
    /// Accepted `set_parameters` calls as (headroom, delay).
    pub parameters: Vec<(Option<f32>, Option<f32>)>,
    /// Last reference period, one vector per channel.
    pub render: Vec<Vec<S>>,
    /// Last capture period as handed in, one vector per channel.
    pub capture: Vec<Vec<S>>,
    pub render_calls: usize,
    pub capture_calls: usize,
    pub failures: Failures,
}

impl<S> Default for EngineLog<S> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            arena_attached: 0,
            arena_detached: 0,
            created: 0,
            destroyed: 0,
            created_with: None,
            reconfigure_blobs: Vec::new(),
            formats: Vec::new(),
            parameters: Vec::new(),
            render: Vec::new(),
            capture: Vec::new(),
            render_calls: 0,
            capture_calls: 0,
            failures: Failures::default(),
        }
    }
}

impl<S> EngineLog<S> {
    /// Configuration calls received, in no particular order.
    pub fn calls(&self) -> Vec<&'static str> {
        let mut calls = Vec::new();
        calls.extend(self.reconfigure_blobs.iter().map(|_| "reconfigure"));
        calls.extend(self.formats.iter().map(|_| "set_stream_formats"));
        calls.extend(self.parameters.iter().map(|_| "set_parameters"));
        calls
    }
}

pub(crate) type Probe<S> = Arc<Mutex<EngineLog<S>>>;

/// Identity engine that records every call into a shared [`EngineLog`].
#[derive(Debug)]
pub(crate) struct RecordingEngine<S> {
    probe: Probe<S>,
}

impl<S: EngineSample> RecordingEngine<S> {
    /// An engine not created through a factory.
    pub fn standalone() -> Self {
        Self {
            probe: Arc::default(),
        }
    }

    pub fn probe(&self) -> Probe<S> {
        Arc::clone(&self.probe)
    }
}

fn check(code: Option<i32>, operation: EngineOperation) -> Result<(), EngineError> {
    match code {
        Some(code) => Err(EngineError::new(operation, code)),
        None => Ok(()),
    }
}

impl<S: EngineSample> EchoCanceller for RecordingEngine<S> {
    type Sample = S;

    fn reconfigure(&mut self, config: &[u8]) -> Result<(), EngineError> {
        let mut log = self.probe.lock().unwrap();
        check(log.failures.reconfigure, EngineOperation::Reconfigure)?;
        log.reconfigure_blobs.push(config.to_vec());
        Ok(())
    }

    fn set_stream_formats(&mut self, formats: &StreamFormats) -> Result<(), EngineError> {
        let mut log = self.probe.lock().unwrap();
        check(log.failures.set_stream_formats, EngineOperation::SetStreamFormats)?;
        log.formats.push(*formats);
        Ok(())
    }

    fn set_parameters(
        &mut self,
        capture_headroom_linear: Option<f32>,
        echo_path_delay_ms: Option<f32>,
    ) -> Result<(), EngineError> {
        let mut log = self.probe.lock().unwrap();
        check(log.failures.set_parameters, EngineOperation::SetParameters)?;
        log.parameters
            .push((capture_headroom_linear, echo_path_delay_ms));
        Ok(())
    }

    fn analyze_render(&mut self, reference: &[&[S]]) {
        let mut log = self.probe.lock().unwrap();
        log.render = reference.iter().map(|ch| ch.to_vec()).collect();
        log.render_calls += 1;
    }

    fn process_capture(&mut self, capture: &mut [&mut [S]]) {
        let mut log = self.probe.lock().unwrap();
        log.capture = capture.iter().map(|ch| ch.to_vec()).collect();
        log.capture_calls += 1;
    }
}

impl<S> Drop for RecordingEngine<S> {
    fn drop(&mut self) {
        if let Ok(mut log) = self.probe.lock() {
            log.destroyed += 1;
            log.events.push("destroy");
        }
    }
}

/// Factory for [`RecordingEngine`]s sharing one probe.
#[derive(Debug)]
pub(crate) struct RecordingFactory<S> {
    probe: Probe<S>,
    arena: Option<MemoryArena>,
}

impl<S: EngineSample> RecordingFactory<S> {
    pub fn new() -> Self {
        Self {
            probe: Arc::default(),
            arena: None,
        }
    }

    pub fn probe(&self) -> Probe<S> {
        Arc::clone(&self.probe)
    }

    pub fn fail_create(self, code: i32) -> Self {
        self.probe.lock().unwrap().failures.create = Some(code);
        self
    }

    pub fn fail_set_parameters(self, code: i32) -> Self {
        self.probe.lock().unwrap().failures.set_parameters = Some(code);
        self
    }
}

impl<S: EngineSample> EngineFactory for RecordingFactory<S> {
    type Engine = RecordingEngine<S>;

    fn attach_memory(&mut self, arena: MemoryArena) {
        let mut log = self.probe.lock().unwrap();
        log.arena_attached += 1;
        log.events.push("attach");
        self.arena = Some(arena);
    }

    fn detach_memory(&mut self) -> Option<MemoryArena> {
        let mut log = self.probe.lock().unwrap();
        log.arena_detached += 1;
        log.events.push("detach");
        self.arena.take()
    }

    fn create(&mut self, formats: &StreamFormats) -> Result<Self::Engine, EngineError> {
        let mut log = self.probe.lock().unwrap();
        check(log.failures.create, EngineOperation::Create)?;
        log.created += 1;
        log.created_with = Some(*formats);
        log.events.push("create");
        Ok(RecordingEngine {
            probe: Arc::clone(&self.probe),
        })
    }
}

/// Reference, microphone, and output queues for one module.
#[derive(Debug)]
pub(crate) struct StreamSet {
    pub reference: RingSource,
    pub microphone: RingSource,
    pub output: RingSink,
    microphone_first: bool,
}

impl StreamSet {
    /// Streams shaped exactly like `config`.
    pub fn new(config: &ModuleConfig) -> Self {
        Self::with_channels(
            config,
            config.reference_channels(),
            config.capture_channels(),
            config.output_format.channels,
        )
    }

    /// Streams with explicit channel counts and `config`'s rates and formats.
    pub fn with_channels(
        config: &ModuleConfig,
        reference: usize,
        microphone: usize,
        output: usize,
    ) -> Self {
        let frames = config.frame_count();
        let reference_format = AudioFormat {
            channels: reference,
            ..config.reference_format
        };
        let microphone_format = AudioFormat {
            channels: microphone,
            ..config.base_format
        };
        let output_format = AudioFormat {
            channels: output,
            ..config.base_format
        };
        Self {
            reference: source(REFERENCE_QUEUE_ID, reference_format, frames),
            microphone: source(MICROPHONE_QUEUE_ID, microphone_format, frames),
            output: sink(output_format, frames * output_format.frame_bytes()),
            microphone_first: false,
        }
    }

    /// Present the microphone before the reference.
    pub fn microphone_first(mut self) -> Self {
        self.microphone_first = true;
        self
    }

    /// Tag the microphone with the reference identity too.
    pub fn both_reference(mut self) -> Self {
        self.microphone = source(
            REFERENCE_QUEUE_ID,
            self.microphone.format(),
            self.microphone.min_available() / self.microphone.frame_bytes(),
        );
        self
    }

    pub fn with_output_period_bytes(mut self, period_bytes: usize) -> Self {
        self.output = sink(self.output.format(), period_bytes);
        self
    }

    /// Declare a different per-period byte count on one of the sources.
    pub fn with_source_period_bytes(mut self, role: StreamRole, period_bytes: usize) -> Self {
        let source = match role {
            StreamRole::Reference => &mut self.reference,
            StreamRole::Microphone => &mut self.microphone,
            StreamRole::Output => return self.with_output_period_bytes(period_bytes),
        };
        let queue_bytes = period_bytes.max(source.frame_bytes());
        *source = RingSource::new(
            source.queue_id(),
            source.format(),
            capacity(queue_bytes),
            period_bytes,
        );
        self
    }

    /// Sources and sinks in presentation order.
    pub fn ports(&mut self) -> (Vec<&mut dyn Source>, Vec<&mut dyn Sink>) {
        let sources: Vec<&mut dyn Source> = if self.microphone_first {
            vec![&mut self.microphone, &mut self.reference]
        } else {
            vec![&mut self.reference, &mut self.microphone]
        };
        (sources, vec![&mut self.output])
    }

    /// Move every ring's positions forward by `bytes`, so the next period
    /// lands at a different wrap point. Rings must be empty.
    pub fn rotate(&mut self, bytes: usize) {
        for source in [&mut self.reference, &mut self.microphone] {
            let mut left = bytes;
            while left > 0 {
                let pushed = source.push(&vec![0x5a; left]);
                source.release_data(pushed).unwrap();
                left -= pushed;
            }
        }
        let mut left = bytes;
        while left > 0 {
            left -= self.output.skip(left);
        }
    }

    /// Queue one period of interleaved samples on each source.
    pub fn feed(&mut self, reference: &[i16], microphone: &[i16]) {
        assert_eq!(self.reference.push_samples(reference), reference.len());
        assert_eq!(self.microphone.push_samples(microphone), microphone.len());
    }
}

fn source(queue_id: u32, format: AudioFormat, frames: usize) -> RingSource {
    let period_bytes = frames * format.frame_bytes();
    RingSource::new(queue_id, format, capacity(period_bytes), period_bytes)
}

fn sink(format: AudioFormat, period_bytes: usize) -> RingSink {
    let queue_bytes = period_bytes.max(format.frame_bytes());
    RingSink::new(format, capacity(queue_bytes), period_bytes)
}

fn capacity(period_bytes: usize) -> NonZero<usize> {
    NonZero::new(period_bytes.max(1) * QUEUE_PERIODS).unwrap()
}

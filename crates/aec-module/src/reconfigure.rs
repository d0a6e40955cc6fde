//! Applying tuning blobs to the running engine.
//!
//! The audio context claims the latest published blob at the start of every
//! period (and at prepare) and applies it before any stream is touched. A
//! failed attempt keeps the blob pending so the next period retries it; the
//! engine keeps running with its last accepted configuration meanwhile.

use std::sync::Arc;

use aec_common_audio::ChannelBuffer;
use tracing::{debug, error, info};

use crate::engine::EchoCanceller;
use crate::error::{Error, Result};
use crate::format::ChannelLayout;
use crate::message::{MessageParser, TuningUpdate};
use crate::tuning::{TuningBlob, TuningSlot, TuningWriter};

/// What an attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to apply.
    Idle,
    /// The blob was applied in full.
    Applied,
}

/// Tracks the current tuning blob and whether it still has to be applied.
#[derive(Debug)]
pub struct Reconfigurator<P> {
    slot: TuningSlot,
    current: Option<Arc<TuningBlob>>,
    /// Replaced blob waiting for the hand-off slot to free up.
    retiring: Option<Arc<TuningBlob>>,
    pending: bool,
    parser: P,
}

impl<P: MessageParser> Reconfigurator<P> {
    /// A fresh reconfigurator starts pending so the first attempt runs.
    pub fn new(parser: P) -> Self {
        Self {
            slot: TuningSlot::new(),
            current: None,
            retiring: None,
            pending: true,
            parser,
        }
    }

    pub fn writer(&self) -> TuningWriter {
        self.slot.writer()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Blob the next attempt applies, or the last one applied.
    pub fn current(&self) -> Option<&TuningBlob> {
        self.current.as_deref()
    }

    /// Adopt the most recently published blob, if any.
    ///
    /// The replaced blob goes back to the writers instead of being freed
    /// here.
    pub fn poll(&mut self) {
        if let Some(blob) = self.retiring.take() {
            self.retiring = self.slot.retire(blob);
        }
        if let Some(blob) = self.slot.take_latest() {
            if let Some(old) = self.current.replace(blob) {
                self.retire(old);
            }
            self.pending = true;
        }
    }

    fn retire(&mut self, blob: Arc<TuningBlob>) {
        let Some(blob) = self.slot.retire(blob) else {
            return;
        };
        if self.retiring.is_none() {
            self.retiring = Some(blob);
        } else {
            // Only reachable when a writer races two reader hand-offs.
            debug!(bytes = blob.len(), "hand-off busy, releasing tuning blob in place");
        }
    }

    /// Apply the current blob if it is pending.
    ///
    /// On success the layout and the capture scratch reflect any accepted
    /// channel change. On failure nothing the engine rejected is adopted and
    /// the blob stays pending.
    pub fn attempt<E: EchoCanceller>(
        &mut self,
        engine: &mut E,
        layout: &mut ChannelLayout,
        capture_scratch: &mut ChannelBuffer<E::Sample>,
    ) -> Result<Outcome> {
        if !self.pending {
            return Ok(Outcome::Idle);
        }
        let Some(blob) = self.current.clone() else {
            self.pending = false;
            return Ok(Outcome::Idle);
        };
        if blob.is_empty() {
            self.pending = false;
            return Ok(Outcome::Idle);
        }

        let update = self.parser.parse(blob.as_bytes()).inspect_err(|e| {
            error!(error = %e, bytes = blob.len(), "tuning message rejected");
        })?;
        if update.is_empty() {
            debug!(bytes = blob.len(), "tuning message carries no known fields");
            self.pending = false;
            return Ok(Outcome::Idle);
        }
        apply(&update, engine, layout, capture_scratch)?;

        self.pending = false;
        Ok(Outcome::Applied)
    }
}

fn apply<E: EchoCanceller>(
    update: &TuningUpdate<'_>,
    engine: &mut E,
    layout: &mut ChannelLayout,
    capture_scratch: &mut ChannelBuffer<E::Sample>,
) -> Result<()> {
    if let Some(config) = update.engine_config {
        info!(bytes = config.len(), "applying engine config");
        engine.reconfigure(config).inspect_err(|e| {
            error!(code = e.code, "engine reconfiguration failed");
        })?;
    }

    if let Some(channels) = capture_channels(update)? {
        layout.check_capture(channels).inspect_err(|e| {
            error!(error = %e, "capture channel count rejected");
        })?;
        info!(channels, "applying capture channel count");
        engine
            .set_stream_formats(&layout.stream_formats_with(channels))
            .inspect_err(|e| {
                error!(code = e.code, "engine stream format update failed");
            })?;
        layout.capture_channels = channels;
        capture_scratch.set_num_channels(channels);
    }

    if update.mic_gain.is_some() || update.reference_delay_ms.is_some() {
        if let Some(gain) = update.mic_gain {
            info!(gain, "applying capture linear headroom");
        }
        if let Some(delay_ms) = update.reference_delay_ms {
            info!(delay_ms, "applying reference delay");
        }
        engine
            .set_parameters(update.mic_gain, update.reference_delay_ms)
            .inspect_err(|e| {
                error!(code = e.code, "engine parameter update failed");
            })?;
    }
    Ok(())
}

/// Reconcile the two capture channel fields into one count.
fn capture_channels(update: &TuningUpdate<'_>) -> Result<Option<usize>> {
    match (update.capture_input_channels, update.capture_output_channels) {
        (Some(input), Some(output)) if input != output => {
            error!(input, output, "unsupported capture channel counts");
            Err(Error::ChannelMismatch { input, output })
        }
        (Some(channels), _) | (None, Some(channels)) => Ok(Some(channels as usize)),
        (None, None) => Ok(None),
    }
}

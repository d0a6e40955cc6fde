//! Hand-off of tuning blobs from control contexts to the audio context.
//!
//! Control writers reassemble fragmented writes into whole blobs and publish
//! them into a single "latest" slot. The audio context claims the slot at
//! the start of a period. Publishing replaces whatever was there, so several
//! writes between two periods coalesce and only the last one is applied.
//! The slot swaps whole `Arc`s, so a reader never observes a partial blob.
//!
//! Blobs the reader replaces are handed back through a second slot and freed
//! by the next publishing writer, keeping deallocation off the audio context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Parameter id of switch controls.
pub const SWITCH_CONTROL_PARAM_ID: u32 = 200;
/// Parameter id of enum controls.
pub const ENUM_CONTROL_PARAM_ID: u32 = 201;

/// Kind of control a configuration write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamId {
    /// Binary blob control. Carries the raw id.
    Binary(u32),
    Switch,
    Enum,
}

impl From<u32> for ParamId {
    fn from(id: u32) -> Self {
        match id {
            SWITCH_CONTROL_PARAM_ID => Self::Switch,
            ENUM_CONTROL_PARAM_ID => Self::Enum,
            id => Self::Binary(id),
        }
    }
}

/// Place of a fragment within a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentPosition {
    Middle,
    First,
    Last,
    /// The whole blob in one write.
    Single,
}

impl FragmentPosition {
    /// Decode the pipeline's wire value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Middle),
            1 => Some(Self::First),
            2 => Some(Self::Last),
            3 => Some(Self::Single),
            _ => None,
        }
    }
}

/// A complete tuning blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningBlob(Box<[u8]>);

impl TuningBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a fragment write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    /// More fragments are expected.
    Partial,
    /// A new blob was published.
    Published,
    /// The blob equals the last published one and was dropped.
    Duplicate,
}

#[derive(Debug, Default)]
struct Shared {
    latest: ArcSwapOption<TuningBlob>,
    /// Filled only by the reader, emptied only by writers.
    retired: ArcSwapOption<TuningBlob>,
    last_published: ArcSwapOption<TuningBlob>,
    published: AtomicU64,
}

/// Reader side of the slot. Owned by the module.
#[derive(Debug, Default)]
pub struct TuningSlot {
    shared: Arc<Shared>,
}

impl TuningSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer for a control context.
    pub fn writer(&self) -> TuningWriter {
        TuningWriter {
            shared: Arc::clone(&self.shared),
            assembly: Vec::new(),
            expected: 0,
            assembling: false,
        }
    }

    /// Claim the most recently published blob, leaving the slot empty.
    pub fn take_latest(&self) -> Option<Arc<TuningBlob>> {
        self.shared.latest.swap(None)
    }

    /// Hand a blob the reader no longer needs to the writers, who free it on
    /// their next publish. Gives the blob back if the hand-off is occupied.
    pub fn retire(&self, blob: Arc<TuningBlob>) -> Option<Arc<TuningBlob>> {
        if self.shared.retired.load().is_some() {
            return Some(blob);
        }
        // Writers only ever empty the slot, so nothing is replaced here.
        self.shared.retired.store(Some(blob));
        None
    }

    /// Number of blobs published since the slot was created.
    pub fn published_count(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }
}

/// Writer side of the slot.
#[derive(Debug)]
pub struct TuningWriter {
    shared: Arc<Shared>,
    assembly: Vec<u8>,
    expected: usize,
    assembling: bool,
}

impl TuningWriter {
    /// Store one fragment of a blob.
    ///
    /// `data_offset_size` is the total blob size for [`FragmentPosition::First`]
    /// and [`FragmentPosition::Single`], and the byte offset of the fragment
    /// otherwise. A malformed sequence discards the partial blob.
    pub fn write_fragment(
        &mut self,
        position: FragmentPosition,
        data_offset_size: usize,
        fragment: &[u8],
    ) -> Result<Publication> {
        match position {
            FragmentPosition::First | FragmentPosition::Single => {
                self.assembly.clear();
                self.expected = data_offset_size;
                self.assembling = true;
            }
            FragmentPosition::Middle | FragmentPosition::Last => {
                if !self.assembling {
                    return self.reject("fragment without a first fragment");
                }
                if data_offset_size != self.assembly.len() {
                    error!(
                        offset = data_offset_size,
                        received = self.assembly.len(),
                        "tuning fragment out of order"
                    );
                    return self.reject("fragment offset does not match received bytes");
                }
            }
        }

        if self.assembly.len() + fragment.len() > self.expected {
            return self.reject("fragment exceeds declared blob size");
        }
        if self.assembly.try_reserve(fragment.len()).is_err() {
            return self.reject("tuning blob too large");
        }
        self.assembly.extend_from_slice(fragment);

        match position {
            FragmentPosition::First | FragmentPosition::Middle => Ok(Publication::Partial),
            FragmentPosition::Last | FragmentPosition::Single => {
                if self.assembly.len() != self.expected {
                    return self.reject("tuning blob shorter than declared size");
                }
                Ok(self.complete())
            }
        }
    }

    /// Publish a whole blob in one write.
    pub fn publish(&mut self, blob: &[u8]) -> Result<Publication> {
        self.write_fragment(FragmentPosition::Single, blob.len(), blob)
    }

    fn complete(&mut self) -> Publication {
        self.assembling = false;
        let blob = TuningBlob(std::mem::take(&mut self.assembly).into_boxed_slice());

        let unchanged = self
            .shared
            .last_published
            .load()
            .as_deref()
            .is_some_and(|last| *last == blob);
        if unchanged {
            debug!(bytes = blob.len(), "tuning blob unchanged, not republished");
            return Publication::Duplicate;
        }

        drop(self.shared.retired.swap(None));
        let blob = Arc::new(blob);
        self.shared.last_published.store(Some(Arc::clone(&blob)));
        self.shared.latest.store(Some(blob));
        let count = self.shared.published.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(count, "tuning blob published");
        Publication::Published
    }

    fn reject(&mut self, reason: &'static str) -> Result<Publication> {
        self.assembly.clear();
        self.assembling = false;
        error!(reason, "tuning fragment rejected");
        Err(Error::InvalidConfig(reason))
    }
}

//! Checkpoints the core passes through, and the probe that observes them.
//!
//! Each background task awaits [`Probe::hit`] at a few fixed points. The
//! default probe returns immediately. Tests inject one that reports the
//! checkpoint and parks the task until released, which makes interleavings
//! of racing tasks reproducible.

use async_trait::async_trait;

use crate::model::{ImageQuality, LocationState, UploadState};

/// How a download attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
    /// Succeeded and its image is now shown.
    Accepted,
    /// Succeeded, but a better image was already shown.
    Superseded,
    /// Failed; the state may or may not have moved to `Error`.
    Failed,
    /// Cancelled by a new round, a better result or `on_stop`.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    AttemptFinished {
        round: u64,
        quality: ImageQuality,
        outcome: AttemptOutcome,
    },
    UploadStarted,
    UploadFinished(UploadState),
    CleanupStarted,
    CleanupFinished,
    LocationClassified(LocationState),
    LocationStopped,
}

#[async_trait]
pub trait Probe: Send + Sync {
    async fn hit(&self, checkpoint: Checkpoint);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

#[async_trait]
impl Probe for NoopProbe {
    async fn hit(&self, _checkpoint: Checkpoint) {}
}

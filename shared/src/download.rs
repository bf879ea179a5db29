//! Racing download rounds.
//!
//! A round starts one attempt per [`ImageQuality`]. Attempts are tracked in
//! a [`DownloadSession`] keyed by [`DownloadId`] so a late attempt from an
//! old round can never be confused with a fresh one. The first success is
//! shown right away; a better success replaces it and cancels anything still
//! pending below it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::capabilities::{DownloadError, ImageDownloader};
use crate::event::{AttemptOutcome, Checkpoint, Probe};
use crate::image_processing::Image;
use crate::model::{DownloadState, ImageQuality};
use crate::view_model::Shared;

/// Identifies one attempt. The token keeps ids unique across rounds even
/// for the same quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId {
    quality: ImageQuality,
    token: Uuid,
}

impl DownloadId {
    #[must_use]
    pub fn new(quality: ImageQuality) -> Self {
        Self {
            quality,
            token: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub const fn quality(&self) -> ImageQuality {
        self.quality
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.quality, self.token)
    }
}

/// Registry of in-flight attempts, owned by the shell.
#[derive(Debug, Default)]
pub(crate) struct DownloadSession {
    round: u64,
    attempts: HashMap<DownloadId, CancellationToken>,
}

impl DownloadSession {
    /// Cancels the previous round and returns the new round number.
    pub(crate) fn begin_round(&mut self) -> u64 {
        self.cancel_all();
        self.round += 1;
        self.round
    }

    pub(crate) fn register(&mut self, quality: ImageQuality) -> (DownloadId, CancellationToken) {
        let id = DownloadId::new(quality);
        let token = CancellationToken::new();
        self.attempts.insert(id, token.clone());
        (id, token)
    }

    pub(crate) fn unregister(&mut self, id: &DownloadId) {
        self.attempts.remove(id);
    }

    /// Cancels and forgets every attempt. Returns how many were registered.
    pub(crate) fn cancel_all(&mut self) -> usize {
        let count = self.attempts.len();
        for (_, token) in self.attempts.drain() {
            token.cancel();
        }
        count
    }

    /// Cancels attempts strictly below `quality`. They stay registered until
    /// they unregister themselves.
    pub(crate) fn cancel_below(&mut self, quality: ImageQuality) -> usize {
        let mut cancelled = 0;
        for (id, token) in &self.attempts {
            if id.quality < quality && !token.is_cancelled() {
                token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    pub(crate) fn len(&self) -> usize {
        self.attempts.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SuccessDecision {
    Accept,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureDecision {
    MarkError,
    Ignore,
}

/// A success is shown unless a strictly better one already is.
pub(crate) fn on_success(current: Option<&DownloadState>, quality: ImageQuality) -> SuccessDecision {
    match current {
        Some(DownloadState::Success { quality: shown, .. }) if *shown > quality => {
            SuccessDecision::Keep
        }
        None
        | Some(DownloadState::Downloading | DownloadState::Error | DownloadState::Success { .. }) => {
            SuccessDecision::Accept
        }
    }
}

/// `registered` counts the failing attempt itself.
pub(crate) fn on_failure(current: Option<&DownloadState>, registered: usize) -> FailureDecision {
    match current {
        None | Some(DownloadState::Error) => FailureDecision::MarkError,
        Some(DownloadState::Downloading) if registered <= 1 => FailureDecision::MarkError,
        Some(DownloadState::Downloading | DownloadState::Success { .. }) => FailureDecision::Ignore,
    }
}

impl Shared {
    #[instrument(skip(self))]
    pub(crate) async fn start_download_round(self: &Arc<Self>) {
        let mut core = self.core.lock().await;
        let round = core.downloads.begin_round();
        core.download = Some(DownloadState::Downloading);

        for quality in ImageQuality::ALL {
            let (id, cancel) = core.downloads.register(quality);
            tokio::spawn(run_attempt(
                Arc::downgrade(self),
                Arc::clone(&self.capabilities.downloader),
                Arc::clone(&self.probe),
                round,
                id,
                cancel,
            ));
        }

        self.publish(&core);
        info!(round, "download round started");
    }

    /// Applies an attempt's result. Runs with the state lock held, so a
    /// cancellation that happened before this point is always seen.
    async fn settle_attempt(
        &self,
        id: DownloadId,
        cancel: &CancellationToken,
        result: Option<Result<Image, DownloadError>>,
    ) -> AttemptOutcome {
        let mut core = self.core.lock().await;
        let quality = id.quality();

        let outcome = match result {
            _ if cancel.is_cancelled() => AttemptOutcome::Cancelled,
            None => AttemptOutcome::Cancelled,
            Some(Ok(image)) => match on_success(core.download.as_ref(), quality) {
                SuccessDecision::Keep => {
                    debug!(%id, "better image already shown");
                    AttemptOutcome::Superseded
                }
                SuccessDecision::Accept => {
                    core.download = Some(DownloadState::Success { quality, image });
                    let preempted = core.downloads.cancel_below(quality);
                    if preempted > 0 {
                        debug!(%id, preempted, "cancelled lower quality attempts");
                    }
                    AttemptOutcome::Accepted
                }
            },
            Some(Err(error)) => match on_failure(core.download.as_ref(), core.downloads.len()) {
                FailureDecision::MarkError => {
                    warn!(%id, %error, "image download failed");
                    core.download = Some(DownloadState::Error);
                    AttemptOutcome::Failed
                }
                FailureDecision::Ignore => {
                    warn!(%id, %error, "image download failed, keeping current state");
                    AttemptOutcome::Failed
                }
            },
        };

        core.downloads.unregister(&id);
        self.publish(&core);
        outcome
    }
}

async fn run_attempt(
    shell: Weak<Shared>,
    downloader: Arc<dyn ImageDownloader>,
    probe: Arc<dyn Probe>,
    round: u64,
    id: DownloadId,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = downloader.download(id.quality()) => Some(result),
    };

    let outcome = match shell.upgrade() {
        Some(shell) => shell.settle_attempt(id, &cancel, result).await,
        None => AttemptOutcome::Cancelled,
    };
    debug!(round, %id, ?outcome, "download attempt finished");

    probe
        .hit(Checkpoint::AttemptFinished {
            round,
            quality: id.quality(),
            outcome,
        })
        .await;
}

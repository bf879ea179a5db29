use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{LocationUpdate, LocationUpdates};
use crate::config::ViewModelConfig;
use crate::event::{Checkpoint, Probe};
use crate::model::LocationState;
use crate::view_model::Shared;

/// Maps one update onto the banner state. A denial wins over a coordinate.
#[must_use]
pub fn classify(update: &LocationUpdate, config: &ViewModelConfig) -> LocationState {
    if update.authorization_denied {
        return LocationState::Error;
    }
    match update.coordinate {
        Some(coordinate) if coordinate.is_within(config.reference_point, config.near_radius_m) => {
            LocationState::Near
        }
        Some(_) => LocationState::Far,
        None => LocationState::Unknown,
    }
}

impl Shared {
    /// Replaces the current subscription with a fresh one.
    #[instrument(skip(self))]
    pub(crate) async fn start_location_updates(self: &Arc<Self>) {
        let cancel = CancellationToken::new();
        {
            let mut core = self.core.lock().await;
            if let Some(previous) = core.location_subscription.replace(cancel.clone()) {
                previous.cancel();
                debug!("previous location subscription cancelled");
            }
            core.location = Some(LocationState::Unknown);
            self.publish(&core);
        }

        let updates = self.capabilities.location.updates();
        tokio::spawn(consume_updates(
            Arc::downgrade(self),
            updates,
            Arc::clone(&self.probe),
            cancel,
        ));
        info!("location updates started");
    }
}

/// Runs until the stream ends, fails, or the subscription is cancelled.
/// Cancellation is only observed while waiting for the next element.
async fn consume_updates(
    shell: Weak<Shared>,
    mut updates: LocationUpdates,
    probe: Arc<dyn Probe>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = updates.next() => next,
        };

        let Some(shell) = shell.upgrade() else {
            break;
        };

        let classified = {
            let mut core = shell.core.lock().await;
            if cancel.is_cancelled() {
                break;
            }
            match next {
                Some(Ok(update)) => {
                    let state = classify(&update, &shell.config);
                    debug!(?state, "location classified");
                    core.location = Some(state);
                    shell.publish(&core);
                    state
                }
                Some(Err(error)) => {
                    warn!(%error, "location updates failed");
                    core.location = Some(LocationState::Error);
                    shell.publish(&core);
                    break;
                }
                None => {
                    debug!("location updates finished");
                    break;
                }
            }
        };

        drop(shell);
        probe.hit(Checkpoint::LocationClassified(classified)).await;
    }

    probe.hit(Checkpoint::LocationStopped).await;
}

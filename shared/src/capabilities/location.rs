use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::StreamError;
use crate::geo::Coordinate;

/// One element of the location stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub authorization_denied: bool,
}

impl LocationUpdate {
    #[must_use]
    pub const fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            authorization_denied: false,
        }
    }

    #[must_use]
    pub const fn denied() -> Self {
        Self {
            coordinate: None,
            authorization_denied: true,
        }
    }
}

/// Possibly infinite. `Err` ends the stream; `None` is a graceful finish.
pub type LocationUpdates = BoxStream<'static, Result<LocationUpdate, StreamError>>;

pub trait LocationProvider: Send + Sync {
    fn updates(&self) -> LocationUpdates;
}

type Subscriber = mpsc::UnboundedSender<Result<LocationUpdate, StreamError>>;

#[derive(Default)]
struct Hub {
    subscribers: Vec<Subscriber>,
    finished: bool,
}

/// Push-based provider: the platform layer forwards its updates through the
/// paired [`LocationFeed`] and every live subscription receives them.
#[derive(Clone, Default)]
pub struct ChannelLocationProvider {
    hub: Arc<Mutex<Hub>>,
}

/// Sending half of a [`ChannelLocationProvider`].
#[derive(Clone)]
pub struct LocationFeed {
    hub: Arc<Mutex<Hub>>,
}

impl ChannelLocationProvider {
    #[must_use]
    pub fn new() -> (Self, LocationFeed) {
        let provider = Self::default();
        let feed = LocationFeed {
            hub: Arc::clone(&provider.hub),
        };
        (provider, feed)
    }
}

impl LocationProvider for ChannelLocationProvider {
    fn updates(&self) -> LocationUpdates {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
            // A finished feed hands out streams that end immediately.
            if !hub.finished {
                hub.subscribers.push(tx);
            }
        }

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

impl LocationFeed {
    /// Deliver an update to every live subscriber. Returns how many got it.
    pub fn send(&self, update: LocationUpdate) -> usize {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        hub.subscribers.retain(|tx| tx.send(Ok(update)).is_ok());
        hub.subscribers.len()
    }

    /// End every stream gracefully.
    pub fn finish(&self) {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        hub.finished = true;
        hub.subscribers.clear();
        debug!("location feed finished");
    }

    /// End every stream with an error.
    pub fn fail(&self, error: StreamError) {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        hub.finished = true;
        for tx in hub.subscribers.drain(..) {
            let _ = tx.send(Err(error.clone()));
        }
        debug!(%error, "location feed failed");
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut hub = self.hub.lock().unwrap_or_else(PoisonError::into_inner);
        hub.subscribers.retain(|tx| !tx.is_closed());
        hub.subscribers.len()
    }
}

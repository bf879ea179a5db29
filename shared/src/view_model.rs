use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::capabilities::{Capabilities, ImageItem};
use crate::config::{ConfigError, ViewModelConfig};
use crate::download::DownloadSession;
use crate::event::{NoopProbe, Probe};
use crate::model::{DownloadState, LocationState, UploadState, ViewState};

/// Mutable state of the screen. Only touched with the `Shared::core` lock
/// held, and the lock is never held across a capability call.
#[derive(Default)]
pub(crate) struct Core {
    pub(crate) download: Option<DownloadState>,
    pub(crate) upload: Option<UploadState>,
    pub(crate) location: Option<LocationState>,
    pub(crate) downloads: DownloadSession,
    pub(crate) location_subscription: Option<CancellationToken>,
}

impl Core {
    fn view(&self) -> ViewState {
        ViewState {
            download: self.download.clone(),
            upload: self.upload,
            location: self.location,
        }
    }

    fn cancel_location_subscription(&mut self) -> bool {
        match self.location_subscription.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Owned by the [`ViewModel`]. Background tasks only keep a `Weak` to it.
pub(crate) struct Shared {
    pub(crate) capabilities: Capabilities,
    pub(crate) config: ViewModelConfig,
    pub(crate) probe: Arc<dyn Probe>,
    pub(crate) core: Mutex<Core>,
    view: watch::Sender<ViewState>,
}

impl Shared {
    /// Push the current state to observers if it changed.
    pub(crate) fn publish(&self, core: &Core) {
        self.view.send_if_modified(|view| {
            let next = core.view();
            if *view == next {
                false
            } else {
                *view = next;
                true
            }
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.downloads.cancel_all();
        core.cancel_location_subscription();
    }
}

/// The screen's view model.
///
/// Commands are async because they take the state lock; the work they start
/// runs on spawned tasks. Dropping the view model cancels all of it.
pub struct ViewModel {
    shared: Arc<Shared>,
}

impl ViewModel {
    /// Fails if `config` does not pass [`ViewModelConfig::validate`].
    pub fn new(capabilities: Capabilities, config: ViewModelConfig) -> Result<Self, ConfigError> {
        Self::with_probe(capabilities, config, Arc::new(NoopProbe))
    }

    pub fn with_probe(
        capabilities: Capabilities,
        config: ViewModelConfig,
        probe: Arc<dyn Probe>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (view, _) = watch::channel(ViewState::default());
        Ok(Self {
            shared: Arc::new(Shared {
                capabilities,
                config,
                probe,
                core: Mutex::new(Core::default()),
                view,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ViewModelConfig {
        &self.shared.config
    }

    // Lifecycle

    #[instrument(skip_all)]
    pub async fn on_start(&self) {
        self.start_location_updates().await;
        self.start_download_round().await;
    }

    /// Cancels outstanding downloads and the location subscription. Visible
    /// state is left as is. Calling it again is a no-op.
    #[instrument(skip_all)]
    pub async fn on_stop(&self) {
        let mut core = self.shared.core.lock().await;
        let attempts = core.downloads.cancel_all();
        let subscription = core.cancel_location_subscription();
        if attempts > 0 || subscription {
            info!(attempts, subscription, "view model stopped");
        }
    }

    // Commands

    pub async fn start_download_round(&self) {
        self.shared.start_download_round().await;
    }

    pub async fn start_location_updates(&self) {
        self.shared.start_location_updates().await;
    }

    /// Runs the whole pipeline, including the result hold. The caller must
    /// check [`Self::uploads_disabled`] first.
    pub async fn upload(&self, item: &dyn ImageItem) {
        self.shared.upload(item).await;
    }

    // State

    #[must_use]
    pub fn download_state(&self) -> Option<DownloadState> {
        self.shared.view.borrow().download.clone()
    }

    #[must_use]
    pub fn upload_state(&self) -> Option<UploadState> {
        self.shared.view.borrow().upload
    }

    #[must_use]
    pub fn location_state(&self) -> Option<LocationState> {
        self.shared.view.borrow().location
    }

    #[must_use]
    pub fn uploads_disabled(&self) -> bool {
        self.shared.view.borrow().uploads_disabled()
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.shared.view.borrow().clone()
    }

    /// Receives a new [`ViewState`] every time one of the states changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.view.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

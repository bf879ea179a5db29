use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{CapabilityError, ImageItem, ImageProcessor};
use crate::event::{Checkpoint, Probe};
use crate::model::UploadState;
use crate::view_model::Shared;

impl Shared {
    /// Load, process and upload one item, hold the result, then reset and
    /// hand the processor cache to a detached cleanup task. Dropping the
    /// future part way still resets the state and cleans up.
    #[instrument(skip_all)]
    pub(crate) async fn upload(self: &Arc<Self>, item: &dyn ImageItem) {
        let mut guard = UploadGuard {
            shell: Arc::downgrade(self),
            processor: Arc::clone(&self.capabilities.processor),
            probe: Arc::clone(&self.probe),
            reset_pending: true,
        };

        self.set_upload(Some(UploadState::Uploading)).await;
        self.probe.hit(Checkpoint::UploadStarted).await;

        let result = match self.run_upload_stages(item).await {
            Ok(()) => {
                info!("upload succeeded");
                UploadState::Success
            }
            Err(error) => {
                warn!(%error, "upload failed");
                UploadState::Error
            }
        };
        self.set_upload(Some(result)).await;
        self.probe.hit(Checkpoint::UploadFinished(result)).await;

        tokio::time::sleep(self.config.upload_result_hold()).await;
        self.set_upload(None).await;
        guard.reset_pending = false;
        debug!("upload state reset");

        // Cleanup is spawned by the guard.
        drop(guard);
    }

    async fn run_upload_stages(&self, item: &dyn ImageItem) -> Result<(), CapabilityError> {
        let raw = item.load().await?;
        debug!(width = raw.width(), height = raw.height(), "item loaded");
        let processed = self.capabilities.processor.process(raw).await?;
        self.capabilities.uploader.upload(&processed).await?;
        Ok(())
    }

    async fn set_upload(&self, state: Option<UploadState>) {
        let mut core = self.core.lock().await;
        core.upload = state;
        self.publish(&core);
    }
}

async fn clear_processor_cache(processor: Arc<dyn ImageProcessor>, probe: Arc<dyn Probe>) {
    probe.hit(Checkpoint::CleanupStarted).await;
    processor.clear_cache().await;
    debug!("processor cache cleared");
    probe.hit(Checkpoint::CleanupFinished).await;
}

/// Spawns the cache cleanup when the pipeline ends, however it ends. If the
/// pipeline was dropped before its own reset, the reset happens here first.
struct UploadGuard {
    shell: Weak<Shared>,
    processor: Arc<dyn ImageProcessor>,
    probe: Arc<dyn Probe>,
    reset_pending: bool,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no runtime, upload cleanup skipped");
            return;
        };

        let shell = self.reset_pending.then(|| self.shell.clone());
        let processor = Arc::clone(&self.processor);
        let probe = Arc::clone(&self.probe);
        runtime.spawn(async move {
            if let Some(shell) = shell.and_then(|shell| shell.upgrade()) {
                shell.set_upload(None).await;
                debug!("interrupted upload reset");
            }
            clear_processor_cache(processor, probe).await;
        });
    }
}

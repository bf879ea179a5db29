use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{ImageUploader, UploadError};
use crate::config::SimulationConfig;
use crate::image_processing::Image;

/// Stand-in for the upload endpoint: waits, then accepts or rejects.
pub struct SimulatedUploader {
    simulation: SimulationConfig,
    accepted: AtomicU64,
}

impl SimulatedUploader {
    #[must_use]
    pub fn new(simulation: SimulationConfig) -> Self {
        Self {
            simulation,
            accepted: AtomicU64::new(0),
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageUploader for SimulatedUploader {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn upload(&self, image: &Image) -> Result<(), UploadError> {
        tokio::time::sleep(self.simulation.upload_latency.sample()).await;

        if self.simulation.fail_upload {
            return Err(UploadError::Rejected {
                reason: "upload failure switch is on".into(),
            });
        }

        let total = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(total, "image uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_by_default() {
        let uploader = SimulatedUploader::new(SimulationConfig::instant());
        uploader.upload(&Image::blank(1, 1)).await.unwrap();
        uploader.upload(&Image::blank(1, 1)).await.unwrap();
        assert_eq!(uploader.accepted(), 2);
    }

    #[tokio::test]
    async fn failure_switch_rejects() {
        let uploader = SimulatedUploader::new(SimulationConfig {
            fail_upload: true,
            ..SimulationConfig::instant()
        });
        let result = uploader.upload(&Image::blank(1, 1)).await;
        assert!(matches!(result, Err(UploadError::Rejected { .. })));
        assert_eq!(uploader.accepted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_configured_latency() {
        let uploader = SimulatedUploader::new(SimulationConfig {
            upload_latency: crate::config::LatencyRange::fixed(1_000),
            ..SimulationConfig::instant()
        });
        let started = tokio::time::Instant::now();
        uploader.upload(&Image::blank(1, 1)).await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(1_000));
    }
}

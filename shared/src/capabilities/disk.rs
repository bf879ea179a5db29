use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DownloadError, ImageDownloader, ImageItem, LoadError};
use crate::config::SimulationConfig;
use crate::image_processing::Image;
use crate::model::ImageQuality;

/// Serves `low.jpg` / `high.jpg` from an asset directory, pretending to be a
/// slow network. The high tier is slower on average.
pub struct DiskImageDownloader {
    asset_dir: PathBuf,
    simulation: SimulationConfig,
}

impl DiskImageDownloader {
    pub fn new(asset_dir: impl Into<PathBuf>, simulation: SimulationConfig) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            simulation,
        }
    }

    #[must_use]
    pub fn asset_path(&self, quality: ImageQuality) -> PathBuf {
        self.asset_dir.join(format!("{quality}.jpg"))
    }
}

#[async_trait]
impl ImageDownloader for DiskImageDownloader {
    #[instrument(skip(self))]
    async fn download(&self, quality: ImageQuality) -> Result<Image, DownloadError> {
        let latency = self.simulation.download_latency(quality).sample();
        tokio::time::sleep(latency).await;

        let path = self.asset_path(quality);
        let name = path.display().to_string();
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DownloadError::NotFound { name: name.clone() },
            _ => DownloadError::Io {
                name: name.clone(),
                message: e.to_string(),
            },
        })?;

        let image = Image::from_bytes(&bytes).map_err(|e| DownloadError::Decode {
            name,
            message: e.to_string(),
        })?;

        if self.simulation.fails_download(quality) {
            return Err(DownloadError::Failed { quality });
        }

        debug!(?latency, width = image.width(), "image downloaded");
        Ok(image)
    }
}

/// Photo-picker item that lives on disk.
#[derive(Debug, Clone)]
pub struct FileImageItem {
    path: PathBuf,
}

impl FileImageItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageItem for FileImageItem {
    async fn load(&self) -> Result<Image, LoadError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::Unavailable,
            _ => LoadError::Io(e.to_string()),
        })?;
        Image::from_bytes(&bytes).map_err(|e| LoadError::Decode(e.to_string()))
    }
}

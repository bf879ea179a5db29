//! Platform services the core depends on.
//!
//! The shell hands the core one implementation of each trait. Every call is
//! a suspension point for the calling task and the only place where a
//! download attempt or the location consumer observes cancellation.

mod disk;
mod location;
mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::image_processing::Image;
use crate::model::ImageQuality;

pub use self::disk::{DiskImageDownloader, FileImageItem};
pub use self::location::{
    ChannelLocationProvider, LocationFeed, LocationProvider, LocationUpdate, LocationUpdates,
};
pub use self::simulated::SimulatedUploader;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("image asset not found: {name}")]
    NotFound { name: String },

    #[error("failed to read image '{name}': {message}")]
    Io { name: String, message: String },

    #[error("failed to decode image '{name}': {message}")]
    Decode { name: String, message: String },

    #[error("{quality} quality download failed")]
    Failed { quality: ImageQuality },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload rejected: {reason}")]
    Rejected { reason: String },

    #[error("connection lost during upload")]
    ConnectionLost,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("image has no pixels")]
    EmptyImage,

    #[error("processor overloaded, try again later")]
    Overloaded,

    #[error("processing interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("item is no longer available")]
    Unavailable,

    #[error("failed to read item: {0}")]
    Io(String),

    #[error("failed to decode item: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("location updates interrupted: {0}")]
    Interrupted(String),

    #[error("location services unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

#[async_trait]
pub trait ImageDownloader: Send + Sync {
    async fn download(&self, quality: ImageQuality) -> Result<Image, DownloadError>;
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: &Image) -> Result<(), UploadError>;
}

#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(&self, image: Image) -> Result<Image, ProcessError>;

    /// Best effort; implementations swallow their own failures.
    async fn clear_cache(&self);
}

/// Something the photo picker handed over that can be turned into an image.
#[async_trait]
pub trait ImageItem: Send + Sync {
    async fn load(&self) -> Result<Image, LoadError>;
}

#[derive(Clone)]
pub struct Capabilities {
    pub downloader: Arc<dyn ImageDownloader>,
    pub uploader: Arc<dyn ImageUploader>,
    pub processor: Arc<dyn ImageProcessor>,
    pub location: Arc<dyn LocationProvider>,
}

impl Capabilities {
    pub fn new(
        downloader: Arc<dyn ImageDownloader>,
        uploader: Arc<dyn ImageUploader>,
        processor: Arc<dyn ImageProcessor>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            downloader,
            uploader,
            processor,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_errors_convert_into_umbrella() {
        let error: CapabilityError = UploadError::ConnectionLost.into();
        assert_eq!(
            error.to_string(),
            "Upload error: connection lost during upload"
        );

        let error: CapabilityError = DownloadError::Failed {
            quality: ImageQuality::High,
        }
        .into();
        assert_eq!(error.to_string(), "Download error: high quality download failed");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::image_processing::Image;

/// Ordered quality tiers. A higher tier preempts a lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    Low,
    High,
}

impl ImageQuality {
    pub const ALL: [Self; 2] = [Self::Low, Self::High];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadState {
    Downloading,
    Success { quality: ImageQuality, image: Image },
    Error,
}

impl DownloadState {
    #[must_use]
    pub const fn is_downloading(&self) -> bool {
        matches!(self, Self::Downloading)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    #[must_use]
    pub const fn quality(&self) -> Option<ImageQuality> {
        match self {
            Self::Success { quality, .. } => Some(*quality),
            Self::Downloading | Self::Error => None,
        }
    }

    #[must_use]
    pub const fn image(&self) -> Option<&Image> {
        match self {
            Self::Success { image, .. } => Some(image),
            Self::Downloading | Self::Error => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Uploading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationState {
    Unknown,
    Near,
    Far,
    Error,
}

/// Everything the rendering layer draws. `None` fields are idle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub download: Option<DownloadState>,
    pub upload: Option<UploadState>,
    pub location: Option<LocationState>,
}

impl ViewState {
    /// Uploads are only offered near the reference point and while no other
    /// upload is in flight or still showing its result.
    #[must_use]
    pub const fn uploads_disabled(&self) -> bool {
        !matches!(
            (self.location, self.upload),
            (Some(LocationState::Near), None)
        )
    }
}

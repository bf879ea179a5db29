// lib.rs - view-model core shared with the native shells

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Concurrency core behind the photo screen.
//!
//! The native shell renders [`ViewState`] and forwards lifecycle and button
//! events to a [`ViewModel`]. Everything platform specific (network, disk,
//! photo picker, geolocation) is injected through [`Capabilities`].
//!
//! Three kinds of background work are coordinated here:
//!
//! - a download round racing a low and a high quality fetch of the same
//!   image, where a better result preempts a worse pending one
//! - a single-flight upload pipeline whose result stays visible for a hold
//!   duration before a fire-and-forget cache cleanup
//! - a long-lived location subscription classified as near/far from a
//!   reference point

pub mod capabilities;
pub mod config;
pub mod event;
pub mod geo;
pub mod image_processing;
pub mod model;

mod download;
mod location;
mod upload;
mod view_model;

pub use capabilities::{
    Capabilities, CapabilityError, ChannelLocationProvider, DiskImageDownloader, DownloadError,
    FileImageItem, ImageDownloader, ImageItem, ImageProcessor, ImageUploader, LoadError,
    LocationFeed, LocationProvider, LocationUpdate, LocationUpdates, ProcessError,
    SimulatedUploader, StreamError, UploadError,
};
pub use config::{ConfigError, LatencyRange, SimulationConfig, ViewModelConfig};
pub use download::DownloadId;
pub use event::{AttemptOutcome, Checkpoint, NoopProbe, Probe};
pub use geo::{haversine_distance, Coordinate, CoordinateError, LatLon};
pub use image_processing::{Image, ProcessingConfig, ResizingProcessor};
pub use location::classify;
pub use model::{DownloadState, ImageQuality, LocationState, UploadState, ViewState};
pub use view_model::ViewModel;

/// Distance under which a location counts as near the reference point.
pub const DEFAULT_NEAR_RADIUS_M: f64 = 10_000.0;
/// How long a finished upload keeps showing its result before resetting.
pub const DEFAULT_UPLOAD_RESULT_HOLD_MS: u64 = 3_000;

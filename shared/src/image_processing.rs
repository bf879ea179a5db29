use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use lru::LruCache;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, instrument};

use crate::capabilities::{ImageProcessor, ProcessError};

/// Cheap-to-clone handle to a decoded image.
#[derive(Clone)]
pub struct Image {
    pixels: Arc<DynamicImage>,
}

impl Image {
    #[must_use]
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        image::load_from_memory(bytes).map(Self::new)
    }

    /// Solid black RGB image, handy for placeholders and tests.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(DynamicImage::new_rgb8(width, height))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.pixels
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
            || (self.pixels.dimensions() == other.pixels.dimensions()
                && self.pixels.color() == other.pixels.color()
                && self.pixels.as_bytes() == other.pixels.as_bytes())
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// Pixels stay in the core; the shell only needs the layout size.
impl Serialize for Image {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Image", 2)?;
        state.serialize_field("width", &self.width())?;
        state.serialize_field("height", &self.height())?;
        state.end()
    }
}

#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub max_dimension: u32,
    pub max_cached_images: usize,
    pub max_concurrent_ops: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            max_cached_images: 8,
            max_concurrent_ops: 2,
        }
    }
}

/// Downsizes oversized images before upload and remembers recent results.
pub struct ResizingProcessor {
    config: ProcessingConfig,
    semaphore: Arc<Semaphore>,
    cache: Mutex<LruCache<u64, Image>>,
    next_key: AtomicU64,
}

impl ResizingProcessor {
    #[must_use]
    pub fn new(config: ProcessingConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_ops));
        let capacity = NonZeroUsize::new(config.max_cached_images).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            semaphore,
            cache: Mutex::new(LruCache::new(capacity)),
            next_key: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ProcessingConfig::default())
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    fn resize_sync(image: &Image, max_dimension: u32) -> Image {
        let (width, height) = (image.width(), image.height());
        if width <= max_dimension && height <= max_dimension {
            return image.clone();
        }
        // resize() keeps the aspect ratio and fits inside the bounds.
        Image::new(
            image
                .as_dynamic()
                .resize(max_dimension, max_dimension, FilterType::Triangle),
        )
    }
}

#[async_trait]
impl ImageProcessor for ResizingProcessor {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn process(&self, image: Image) -> Result<Image, ProcessError> {
        let _permit = self
            .semaphore
            .try_acquire()
            .map_err(|_| ProcessError::Overloaded)?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ProcessError::EmptyImage);
        }

        let max_dimension = self.config.max_dimension;
        let processed = tokio::task::spawn_blocking(move || Self::resize_sync(&image, max_dimension))
            .await
            .map_err(|e| ProcessError::Interrupted(e.to_string()))?;

        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().await.put(key, processed.clone());

        debug!(
            width = processed.width(),
            height = processed.height(),
            "image processed"
        );
        Ok(processed)
    }

    async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        let cleared = cache.len();
        cache.clear();
        debug!(cleared, "processor cache cleared");
    }
}

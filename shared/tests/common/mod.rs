// Shared fakes for the integration tests. Not every test file uses all of them.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use photo_nearby::{
    Capabilities, ChannelLocationProvider, Checkpoint, DownloadError, Image, ImageDownloader,
    ImageItem, ImageProcessor, ImageQuality, ImageUploader, LoadError, LocationFeed, Probe,
    ProcessError, UploadError, ViewModel, ViewModelConfig,
};
use tokio::sync::{mpsc, oneshot};

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

/// A download call parked until the test decides how it ends.
pub struct PendingDownload {
    pub quality: ImageQuality,
    respond: oneshot::Sender<Result<Image, DownloadError>>,
}

impl PendingDownload {
    /// Returns false when the attempt was already cancelled.
    pub fn succeed(self) -> bool {
        self.respond.send(Ok(Image::blank(2, 2))).is_ok()
    }

    pub fn fail(self) -> bool {
        let quality = self.quality;
        self.respond
            .send(Err(DownloadError::Failed { quality }))
            .is_ok()
    }

    /// The attempt stopped waiting for this download.
    pub fn is_abandoned(&self) -> bool {
        self.respond.is_closed()
    }
}

pub struct ScriptedDownloader {
    requests: mpsc::UnboundedSender<PendingDownload>,
}

#[async_trait]
impl ImageDownloader for ScriptedDownloader {
    async fn download(&self, quality: ImageQuality) -> Result<Image, DownloadError> {
        let (respond, response) = oneshot::channel();
        if self
            .requests
            .send(PendingDownload { quality, respond })
            .is_err()
        {
            return Err(DownloadError::Failed { quality });
        }
        response
            .await
            .unwrap_or(Err(DownloadError::Failed { quality }))
    }
}

pub struct DownloadRequests {
    rx: mpsc::UnboundedReceiver<PendingDownload>,
}

impl DownloadRequests {
    pub async fn next(&mut self) -> PendingDownload {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a download request")
            .expect("downloader dropped")
    }

    /// The two requests of one round, as `(low, high)`.
    pub async fn round(&mut self) -> (PendingDownload, PendingDownload) {
        let first = self.next().await;
        let second = self.next().await;
        match (first.quality, second.quality) {
            (ImageQuality::Low, ImageQuality::High) => (first, second),
            (ImageQuality::High, ImageQuality::Low) => (second, first),
            other => panic!("expected one request per quality, got {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Upload pipeline
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockUploader {
    pub fail: AtomicBool,
    uploaded: AtomicUsize,
}

impl MockUploader {
    pub fn uploaded(&self) -> usize {
        self.uploaded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageUploader for MockUploader {
    async fn upload(&self, _image: &Image) -> Result<(), UploadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError::ConnectionLost);
        }
        self.uploaded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockProcessor {
    pub fail: AtomicBool,
    processed: AtomicUsize,
    cleared: AtomicUsize,
}

impl MockProcessor {
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProcessor for MockProcessor {
    async fn process(&self, image: Image) -> Result<Image, ProcessError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProcessError::Interrupted("mock".into()));
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(image)
    }

    async fn clear_cache(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockItem {
    result: Result<Image, LoadError>,
}

impl MockItem {
    pub fn new() -> Self {
        Self {
            result: Ok(Image::blank(4, 4)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            result: Err(LoadError::Unavailable),
        }
    }
}

#[async_trait]
impl ImageItem for MockItem {
    async fn load(&self) -> Result<Image, LoadError> {
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// A task parked at a checkpoint. Dropping it lets the task continue.
#[derive(Debug)]
pub struct Hit {
    pub checkpoint: Checkpoint,
    resume: oneshot::Sender<()>,
}

impl Hit {
    pub fn release(self) {
        let _ = self.resume.send(());
    }
}

pub struct ChannelProbe {
    tx: mpsc::UnboundedSender<Hit>,
}

#[async_trait]
impl Probe for ChannelProbe {
    async fn hit(&self, checkpoint: Checkpoint) {
        let (resume, resumed) = oneshot::channel();
        if self.tx.send(Hit { checkpoint, resume }).is_ok() {
            let _ = resumed.await;
        }
    }
}

pub struct Hits {
    rx: mpsc::UnboundedReceiver<Hit>,
}

impl Hits {
    pub async fn next(&mut self) -> Hit {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a checkpoint")
            .expect("probe dropped")
    }

    /// Releases every hit until one matches.
    pub async fn until(&mut self, mut matches: impl FnMut(&Checkpoint) -> bool) -> Hit {
        loop {
            let hit = self.next().await;
            if matches(&hit.checkpoint) {
                return hit;
            }
            hit.release();
        }
    }

    /// Passes `checkpoint` and returns once its task has moved on.
    pub async fn pass(&mut self, checkpoint: Checkpoint) {
        let hit = self.next().await;
        assert_eq!(hit.checkpoint, checkpoint);
        hit.release();
    }

    pub async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await;
        assert!(extra.is_err(), "unexpected checkpoint: {extra:?}");
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub vm: ViewModel,
    pub downloads: DownloadRequests,
    pub hits: Hits,
    pub feed: LocationFeed,
    pub uploader: Arc<MockUploader>,
    pub processor: Arc<MockProcessor>,
}

impl Harness {
    /// No result hold, so upload tests don't wait on the clock.
    pub fn new() -> Self {
        Self::with_config(ViewModelConfig::default().with_upload_result_hold(Duration::ZERO))
    }

    pub fn with_config(config: ViewModelConfig) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();
        let (location, feed) = ChannelLocationProvider::new();
        let uploader = Arc::new(MockUploader::default());
        let processor = Arc::new(MockProcessor::default());

        let capabilities = Capabilities::new(
            Arc::new(ScriptedDownloader { requests }),
            uploader.clone(),
            processor.clone(),
            Arc::new(location),
        );
        let vm = ViewModel::with_probe(
            capabilities,
            config,
            Arc::new(ChannelProbe { tx: probe_tx }),
        )
        .expect("harness config is valid");

        Self {
            vm,
            downloads: DownloadRequests { rx },
            hits: Hits { rx: probe_rx },
            feed,
            uploader,
            processor,
        }
    }
}

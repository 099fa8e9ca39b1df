//! Synthetic capture backend
//!
//! Generates a gradient test pattern and fixed-size recording fragments. Used
//! on hosts without camera hardware and throughout the tests; every failure
//! mode of a real device (denied permission, missing hardware, slow warm-up,
//! zero-sized feed, silent encoder) can be switched on.

use super::{CaptureBackend, FragmentRecorder, StreamConstraints, StreamSource};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{TrackInfo, TrackKind, VideoFrame, VideoResolution};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

const BACKEND_NAME: &str = "synthetic";
const FRAGMENT_MAGIC: &[u8; 4] = b"FCAP";

/// Behaviour switches for [`SyntheticBackend`]
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Refuse every acquisition with `PermissionDenied`
    pub deny_permission: bool,
    /// A camera is attached
    pub has_camera: bool,
    /// A microphone is attached
    pub has_microphone: bool,
    /// Dimensions reported once metadata has loaded
    pub native_resolution: VideoResolution,
    /// Time between acquisition and frame metadata becoming available
    pub warmup: Duration,
    /// Never load frame metadata
    pub never_ready: bool,
    /// Recorder timeslice; `None` emits only the final fragment on stop
    pub timeslice: Option<Duration>,
    /// Bytes per fragment; zero makes the recorder silent
    pub fragment_size: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            deny_permission: false,
            has_camera: true,
            has_microphone: true,
            native_resolution: VideoResolution::VGA,
            warmup: Duration::ZERO,
            never_ready: false,
            timeslice: Some(Duration::from_secs(1)),
            fragment_size: 1024,
        }
    }
}

/// In-process capture backend
#[derive(Debug)]
pub struct SyntheticBackend {
    config: SyntheticConfig,
    acquisitions: AtomicU64,
    live_streams: Arc<AtomicU32>,
}

impl SyntheticBackend {
    /// Backend with default behaviour
    pub fn new() -> Self {
        Self::with_config(SyntheticConfig::default())
    }

    /// Backend with explicit behaviour
    pub fn with_config(config: SyntheticConfig) -> Self {
        Self {
            config,
            acquisitions: AtomicU64::new(0),
            live_streams: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Refuse permission
    pub fn denying_permission() -> Self {
        Self::with_config(SyntheticConfig {
            deny_permission: true,
            ..Default::default()
        })
    }

    /// No camera attached
    pub fn without_camera() -> Self {
        Self::with_config(SyntheticConfig {
            has_camera: false,
            ..Default::default()
        })
    }

    /// Successful acquisitions so far
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Streams acquired and not yet stopped
    pub fn live_streams(&self) -> u32 {
        self.live_streams.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn acquire(&self, constraints: StreamConstraints) -> MediaResult<Box<dyn StreamSource>> {
        constraints.validate()?;

        if self.config.deny_permission {
            let device = if constraints.video { "camera" } else { "microphone" };
            return Err(MediaError::PermissionDenied {
                device: device.to_string(),
            });
        }
        if constraints.video && !self.config.has_camera {
            return Err(MediaError::DeviceUnavailable {
                device: "camera".to_string(),
                reason: "no camera attached".to_string(),
            });
        }
        if constraints.audio && !self.config.has_microphone {
            return Err(MediaError::DeviceUnavailable {
                device: "microphone".to_string(),
                reason: "no microphone attached".to_string(),
            });
        }

        let sequence = self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(TrackInfo {
                id: format!("synthetic-video-{}", sequence),
                kind: TrackKind::Video,
                label: "Synthetic Camera".to_string(),
            });
        }
        if constraints.audio {
            tracks.push(TrackInfo {
                id: format!("synthetic-audio-{}", sequence),
                kind: TrackKind::Audio,
                label: "Synthetic Microphone".to_string(),
            });
        }

        self.live_streams.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Synthetic backend granted stream {} with {} tracks",
            sequence,
            tracks.len()
        );

        Ok(Box::new(SyntheticStream {
            config: self.config.clone(),
            tracks,
            acquired_at: Instant::now(),
            stopped: AtomicBool::new(false),
            live_streams: self.live_streams.clone(),
        }))
    }
}

struct SyntheticStream {
    config: SyntheticConfig,
    tracks: Vec<TrackInfo>,
    acquired_at: Instant,
    stopped: AtomicBool,
    live_streams: Arc<AtomicU32>,
}

impl SyntheticStream {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Video)
    }
}

impl StreamSource for SyntheticStream {
    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
            trace!("Synthetic stream stopped");
        }
    }

    fn video_geometry(&self) -> Option<VideoResolution> {
        if self.is_stopped() || !self.has_video() || self.config.never_ready {
            return None;
        }
        if self.acquired_at.elapsed() < self.config.warmup {
            return None;
        }
        Some(self.config.native_resolution)
    }

    fn rasterize(&self, resolution: VideoResolution) -> MediaResult<VideoFrame> {
        if self.is_stopped() {
            return Err(MediaError::NotReady {
                reason: "stream stopped".to_string(),
            });
        }
        if resolution.is_empty() {
            return Err(MediaError::InvalidFrameData {
                expected: VideoFrame::BYTES_PER_PIXEL,
                actual: 0,
            });
        }

        let (width, height) = (resolution.width, resolution.height);
        let mut data = Vec::with_capacity(resolution.pixel_count() * VideoFrame::BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(128);
            }
        }

        Ok(VideoFrame {
            width,
            height,
            data,
            timestamp: self.acquired_at.elapsed().as_millis() as u64,
        })
    }

    fn create_recorder(&self, mime_type: &str) -> MediaResult<Box<dyn FragmentRecorder>> {
        if self.is_stopped() {
            return Err(MediaError::NotReady {
                reason: "stream stopped".to_string(),
            });
        }
        if !mime_type.starts_with("video/") {
            return Err(MediaError::InvalidMediaType {
                expected: "video/*".to_string(),
                actual: mime_type.to_string(),
            });
        }
        Ok(Box::new(SyntheticRecorder {
            timeslice: self.config.timeslice,
            shared: Arc::new(RecorderShared {
                fragment_size: self.config.fragment_size,
                sender: Mutex::new(None),
                paused: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
            }),
            task: None,
        }))
    }
}

struct RecorderShared {
    fragment_size: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    paused: AtomicBool,
    sequence: AtomicU64,
}

impl RecorderShared {
    fn emit(&self, sender: &mpsc::UnboundedSender<Bytes>) {
        if self.fragment_size == 0 {
            return;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut fragment = BytesMut::with_capacity(self.fragment_size.max(12));
        fragment.put_slice(FRAGMENT_MAGIC);
        fragment.put_u64(sequence);
        fragment.resize(self.fragment_size.max(12), sequence as u8);
        let _ = sender.send(fragment.freeze());
    }
}

struct SyntheticRecorder {
    timeslice: Option<Duration>,
    shared: Arc<RecorderShared>,
    task: Option<JoinHandle<()>>,
}

impl FragmentRecorder for SyntheticRecorder {
    fn start(&mut self, fragments: mpsc::UnboundedSender<Bytes>) -> MediaResult<()> {
        *self.shared.sender.lock() = Some(fragments);

        if let Some(timeslice) = self.timeslice {
            let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                MediaError::Backend {
                    backend: BACKEND_NAME.to_string(),
                    message: e.to_string(),
                }
            })?;
            let shared = self.shared.clone();
            self.task = Some(runtime.spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + timeslice, timeslice);
                loop {
                    ticker.tick().await;
                    if shared.paused.load(Ordering::SeqCst) {
                        continue;
                    }
                    let guard = shared.sender.lock();
                    match guard.as_ref() {
                        Some(sender) => shared.emit(sender),
                        None => break,
                    }
                }
            }));
        }
        Ok(())
    }

    fn pause(&mut self) -> MediaResult<()> {
        self.shared.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> MediaResult<()> {
        self.shared.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // Flush under the lock so the final fragment lands after any periodic one
        let mut guard = self.shared.sender.lock();
        if let Some(sender) = guard.take() {
            self.shared.emit(&sender);
        }
        Ok(())
    }
}

impl Drop for SyntheticRecorder {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

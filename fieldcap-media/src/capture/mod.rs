//! Capture backend seam
//!
//! The platform layer that owns real cameras and microphones sits behind
//! [`CaptureBackend`]. A backend hands out [`StreamSource`]s, and each source
//! can rasterize its current frame or produce a [`FragmentRecorder`] that
//! emits encoded fragments on a timeslice.

pub mod synthetic;

use crate::error::{MediaError, MediaResult};
use crate::tracks::{TrackInfo, VideoFrame, VideoResolution};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use synthetic::{SyntheticBackend, SyntheticConfig};

/// Which tracks to request when opening a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Request a camera track
    pub video: bool,
    /// Request a microphone track
    pub audio: bool,
}

impl StreamConstraints {
    /// Camera plus microphone, as needed for recording
    pub fn camera_and_microphone() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }

    /// Camera only
    pub fn camera_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }

    /// At least one track must be requested
    pub fn validate(&self) -> MediaResult<()> {
        if !self.video && !self.audio {
            return Err(MediaError::InvalidConfiguration {
                message: "stream constraints request no tracks".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::camera_and_microphone()
    }
}

/// Platform capture backend
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Ask the platform for a stream satisfying `constraints`
    ///
    /// May prompt the user; fails with `PermissionDenied` when refused and
    /// `DeviceUnavailable` when the hardware is missing or busy.
    async fn acquire(&self, constraints: StreamConstraints) -> MediaResult<Box<dyn StreamSource>>;
}

/// A live platform stream
pub trait StreamSource: Send + Sync {
    /// Tracks the platform granted
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Stop every track. Calling it again is a no-op.
    fn stop(&self);

    /// Intrinsic video dimensions, `None` until frame metadata has loaded
    ///
    /// A loaded feed can still report `0x0`.
    fn video_geometry(&self) -> Option<VideoResolution>;

    /// Draw the current frame at `resolution`
    fn rasterize(&self, resolution: VideoResolution) -> MediaResult<VideoFrame>;

    /// Create a recorder producing `mime_type` fragments
    fn create_recorder(&self, mime_type: &str) -> MediaResult<Box<dyn FragmentRecorder>>;
}

/// Timesliced encoder attached to a stream
///
/// Fragments arrive on the channel passed to [`FragmentRecorder::start`] in
/// production order. `stop` flushes the final fragment before returning.
pub trait FragmentRecorder: Send {
    /// Begin emitting fragments into `fragments`
    fn start(&mut self, fragments: mpsc::UnboundedSender<Bytes>) -> MediaResult<()>;

    /// Suspend fragment production
    fn pause(&mut self) -> MediaResult<()>;

    /// Resume fragment production
    fn resume(&mut self) -> MediaResult<()>;

    /// Flush pending data and stop
    fn stop(&mut self) -> MediaResult<()>;
}

//! Device stream handles and the session that owns them
//!
//! A [`MediaDeviceSession`] holds at most one live [`DeviceStreamHandle`].
//! Opening a new stream closes the previous one first, and every handle
//! stops its platform tracks exactly once: on an explicit `close`, or when
//! the last clone is dropped.

use crate::capture::{CaptureBackend, StreamConstraints, StreamSource};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{TrackInfo, TrackKind, VideoResolution};
use chrono::{DateTime, Utc};
use fieldcap_core::{ResourceKind, ResourceLease, ResourceLedger};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Live camera/microphone stream
///
/// Cloning shares the same underlying stream.
#[derive(Clone)]
pub struct DeviceStreamHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: Uuid,
    constraints: StreamConstraints,
    tracks: Vec<TrackInfo>,
    source: Box<dyn StreamSource>,
    active: AtomicBool,
    lease: Mutex<Option<ResourceLease>>,
    opened_at: DateTime<Utc>,
}

impl HandleInner {
    fn close(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.source.stop();
        self.lease.lock().take();
        debug!("Closed device stream {}", self.id);
        true
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl DeviceStreamHandle {
    fn new(
        constraints: StreamConstraints,
        source: Box<dyn StreamSource>,
        lease: ResourceLease,
    ) -> Self {
        let tracks = source.tracks();
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                constraints,
                tracks,
                source,
                active: AtomicBool::new(true),
                lease: Mutex::new(Some(lease)),
                opened_at: Utc::now(),
            }),
        }
    }

    /// Handle identifier
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Constraints the stream was opened with
    pub fn constraints(&self) -> StreamConstraints {
        self.inner.constraints
    }

    /// Tracks granted by the platform
    pub fn tracks(&self) -> &[TrackInfo] {
        &self.inner.tracks
    }

    /// Whether a track of `kind` is present
    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.inner.tracks.iter().any(|t| t.kind == kind)
    }

    /// When the stream was opened
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.inner.opened_at
    }

    /// Whether the tracks are still running
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Frame metadata has loaded, so a still can be taken
    pub fn is_ready(&self) -> bool {
        self.video_geometry().is_some()
    }

    /// Intrinsic video dimensions, if known
    pub fn video_geometry(&self) -> Option<VideoResolution> {
        if !self.is_active() {
            return None;
        }
        self.inner.source.video_geometry()
    }

    /// Stop all tracks. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.inner.close()
    }

    pub(crate) fn source(&self) -> MediaResult<&dyn StreamSource> {
        if !self.is_active() {
            return Err(MediaError::HandleClosed {
                handle_id: self.inner.id.to_string(),
            });
        }
        Ok(self.inner.source.as_ref())
    }
}

impl fmt::Debug for DeviceStreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStreamHandle")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Acquires and tracks the app's single device stream
pub struct MediaDeviceSession {
    backend: Arc<dyn CaptureBackend>,
    ledger: ResourceLedger,
    current: Mutex<Option<DeviceStreamHandle>>,
}

impl MediaDeviceSession {
    /// Create a session over `backend`, accounting handles in `ledger`
    pub fn new(backend: Arc<dyn CaptureBackend>, ledger: ResourceLedger) -> Self {
        Self {
            backend,
            ledger,
            current: Mutex::new(None),
        }
    }

    /// Open a stream, closing any handle this session already holds
    pub async fn open(&self, constraints: StreamConstraints) -> MediaResult<DeviceStreamHandle> {
        constraints.validate()?;

        let previous = self.current.lock().take();
        if let Some(previous) = previous {
            if previous.close() {
                debug!("Closed previous device stream {} before reopening", previous.id());
            }
        }

        let lease = self
            .ledger
            .acquire(ResourceKind::DeviceHandle)
            .map_err(|e| MediaError::DeviceUnavailable {
                device: "camera".to_string(),
                reason: e.to_string(),
            })?;

        let source = match self.backend.acquire(constraints).await {
            Ok(source) => source,
            Err(e) => {
                warn!("{} backend refused stream: {}", self.backend.name(), e);
                return Err(e);
            }
        };

        let handle = DeviceStreamHandle::new(constraints, source, lease);
        for (wanted, kind) in [(constraints.video, TrackKind::Video), (constraints.audio, TrackKind::Audio)] {
            if wanted && !handle.has_track(kind) {
                handle.close();
                return Err(MediaError::MissingTrack {
                    kind: kind.to_string(),
                });
            }
        }

        let displaced = self.current.lock().replace(handle.clone());
        if let Some(displaced) = displaced {
            displaced.close();
        }

        info!(
            "Opened device stream {} ({} tracks) via {}",
            handle.id(),
            handle.tracks().len(),
            self.backend.name()
        );
        Ok(handle)
    }

    /// Close `handle` and forget it if it is the current one
    pub fn close(&self, handle: &DeviceStreamHandle) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().map(|h| h.id()) == Some(handle.id()) {
            current.take();
        }
        drop(current);
        handle.close()
    }

    /// Close whatever this session holds
    pub fn close_current(&self) -> bool {
        let current = self.current.lock().take();
        current.map_or(false, |handle| handle.close())
    }

    /// The live handle, if any
    pub fn current(&self) -> Option<DeviceStreamHandle> {
        self.current
            .lock()
            .as_ref()
            .filter(|h| h.is_active())
            .cloned()
    }

    /// Whether a live handle exists
    pub fn is_open(&self) -> bool {
        self.current().is_some()
    }

    /// Ledger this session accounts against
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }
}

impl fmt::Debug for MediaDeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDeviceSession")
            .field("backend", &self.backend.name())
            .field("current", &self.current())
            .finish()
    }
}

impl Drop for MediaDeviceSession {
    fn drop(&mut self) {
        self.close_current();
    }
}

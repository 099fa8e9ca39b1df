//! Media submission screen
//!
//! Composes the device session, still capture and bounded recorder into the
//! "capture one item and upload it" flow. The screen owns the camera handle,
//! the recording countdown and the preview URL; dropping it releases all
//! three. Hardware errors leave the screen with the camera closed and the
//! recorder idle. Upload and validation errors keep the captured media so
//! the user can retry without capturing again.
//!
//! When a geolocator is supplied the device position is sampled once as the
//! screen mounts. That sample runs in the background and a failure only
//! leaves [`SubmissionScreen::location_error`] set.

use crate::config::FieldCapConfig;
use crate::event::{Event, EventBus, EventStream};
use bytes::Bytes;
use fieldcap_api::{HotelDirectory, HotelId, HotelSummary, MediaUploader, UploadReceipt, UploadRequest};
use fieldcap_core::{
    Coordinates, FieldCapError, FieldCapResult, LocationSample, PreviewRegistry, PreviewSlot, PreviewUrl,
    ResourceLedger, ScopedTask,
};
use fieldcap_location::{Geolocator, LocationError, LocationResult};
use fieldcap_media::{
    BoundedRecorder, CaptureBackend, CapturedMedia, MediaDeviceSession, MediaError, MediaKind,
    RecorderState, RecordingOutcome, StillCapture, StreamConstraints,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators the submission screen talks to
#[derive(Clone)]
pub struct SubmissionServices {
    /// Camera and microphone access
    pub capture: Arc<dyn CaptureBackend>,
    /// Upload target for captured media
    pub uploader: Arc<dyn MediaUploader>,
    /// Source of selectable hotels
    pub hotels: Arc<dyn HotelDirectory>,
    /// Position source for tagging uploads; `None` disables tagging
    pub geolocator: Option<Arc<dyn Geolocator>>,
}

/// Position attached to uploads, shared with the mount-time sample
#[derive(Debug, Default)]
struct LocationTag {
    coordinates: Option<Coordinates>,
    error: Option<String>,
}

impl LocationTag {
    /// A failed sample keeps whatever position was already known
    fn record(&mut self, sampled: &LocationResult<LocationSample>) {
        match sampled {
            Ok(sample) => {
                self.coordinates = Some(sample.coordinates());
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

async fn sample_position(
    geolocator: Arc<dyn Geolocator>,
    timeout: Duration,
) -> LocationResult<LocationSample> {
    let sampled = match tokio::time::timeout(timeout, geolocator.current_position()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout { after: timeout }),
    };
    sampled.and_then(|sample| {
        sample.coordinates().validate()?;
        Ok(sample)
    })
}

/// Controller behind the media upload form
pub struct SubmissionScreen {
    session: MediaDeviceSession,
    still: StillCapture,
    recorder: BoundedRecorder,
    services: SubmissionServices,
    events: EventBus,
    preview: PreviewSlot,
    max_image_bytes: usize,
    position_timeout: Duration,

    hotels: Vec<HotelSummary>,
    target: Option<HotelSummary>,
    description: String,
    location: Arc<Mutex<LocationTag>>,
    media: Option<CapturedMedia>,
    last_error: Option<String>,
    camera_announced: bool,

    _mount_sample: Option<ScopedTask>,
    _recorder_events: ScopedTask,
}

impl SubmissionScreen {
    /// Build the screen; fails with `Initialization` outside a tokio runtime
    pub fn new(
        config: &FieldCapConfig,
        services: SubmissionServices,
        ledger: ResourceLedger,
        previews: PreviewRegistry,
    ) -> FieldCapResult<Self> {
        tokio::runtime::Handle::try_current().map_err(|e| FieldCapError::Initialization {
            reason: format!("submission screen needs a tokio runtime: {}", e),
        })?;
        config.validate()?;

        let recorder = BoundedRecorder::new(config.recorder_config())?.with_ledger(ledger.clone());
        let still_config = config.still_config();
        still_config.validate()?;

        let events = EventBus::default();
        let mut recorder_events = recorder.subscribe();
        let bus = events.clone();
        let forwarder = ScopedTask::spawn("submission-recorder-events", async move {
            loop {
                match recorder_events.recv().await {
                    Ok(event) => bus.publish(Event::from(event)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} recorder events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let position_timeout = Duration::from_secs(config.position_timeout_secs);
        let location = Arc::new(Mutex::new(LocationTag::default()));
        let mount_sample = services.geolocator.clone().map(|geolocator| {
            let tag = location.clone();
            ScopedTask::spawn("submission-location", async move {
                let sampled = sample_position(geolocator, position_timeout).await;
                if let Err(e) = &sampled {
                    warn!("Could not tag upload with a location: {}", e);
                }
                tag.lock().record(&sampled);
            })
        });

        Ok(Self {
            session: MediaDeviceSession::new(services.capture.clone(), ledger),
            still: StillCapture::new(still_config),
            recorder,
            services,
            events,
            preview: PreviewSlot::new(previews),
            max_image_bytes: config.max_attached_image_bytes,
            position_timeout,
            hotels: Vec::new(),
            target: None,
            description: String::new(),
            location,
            media: None,
            last_error: None,
            camera_announced: false,
            _mount_sample: mount_sample,
            _recorder_events: forwarder,
        })
    }

    /// Subscribe to screen events
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    // ----- form fields -----

    /// Fetch the hotel listing
    pub async fn load_hotels(&mut self) -> FieldCapResult<&[HotelSummary]> {
        let listed = self.services.hotels.list_hotels().await;
        let hotels = listed.map_err(|e| self.fail(FieldCapError::from(e)))?;
        debug!("Loaded {} hotels for selection", hotels.len());

        if let Some(target) = &self.target {
            if !hotels.iter().any(|h| h.id == target.id && h.is_active) {
                self.target = None;
            }
        }
        self.hotels = hotels;
        Ok(&self.hotels)
    }

    /// Hotels loaded by [`load_hotels`](Self::load_hotels)
    pub fn hotels(&self) -> &[HotelSummary] {
        &self.hotels
    }

    /// Choose the hotel the media belongs to
    pub fn select_target(&mut self, id: HotelId) -> FieldCapResult<()> {
        let Some(hotel) = self.hotels.iter().find(|h| h.id == id).cloned() else {
            return Err(self.reject("hotel_id", format!("unknown hotel {}", id)));
        };
        if !hotel.is_active {
            return Err(self.reject(
                "hotel_id",
                format!("{} is not accepting uploads", hotel.name),
            ));
        }
        self.target = Some(hotel);
        Ok(())
    }

    /// Selected hotel
    pub fn target(&self) -> Option<&HotelSummary> {
        self.target.as_ref()
    }

    /// Set the free-text description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Current description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sample the device position again to tag the upload
    ///
    /// Supersedes the sample taken at mount. A failure is reported but does
    /// not block uploading.
    pub async fn capture_location(&mut self) -> FieldCapResult<Coordinates> {
        let Some(geolocator) = self.services.geolocator.clone() else {
            return Err(FieldCapError::PositionUnavailable {
                reason: "no geolocation capability".to_string(),
            });
        };
        self._mount_sample = None;

        let sampled = sample_position(geolocator, self.position_timeout).await;
        self.location.lock().record(&sampled);
        match sampled {
            Ok(sample) => Ok(sample.coordinates()),
            Err(e) => {
                warn!("Could not tag upload with a location: {}", e);
                Err(e.into())
            }
        }
    }

    /// Position attached to the next upload
    pub fn location(&self) -> Option<Coordinates> {
        self.location.lock().coordinates
    }

    /// Why the position could not be sampled
    pub fn location_error(&self) -> Option<String> {
        self.location.lock().error.clone()
    }

    // ----- camera -----

    /// Open camera and microphone, replacing any stream already open
    pub async fn open_camera(&mut self) -> FieldCapResult<()> {
        self.sync_recording();
        if self.recorder.is_active() {
            return Err(self.fail(MediaError::RecordingActive.into()));
        }

        let opened = self
            .session
            .open(StreamConstraints::camera_and_microphone())
            .await;
        match opened {
            Ok(handle) => {
                self.camera_announced = true;
                self.last_error = None;
                self.events.publish(Event::CameraOpened {
                    handle_id: handle.id(),
                    with_audio: handle.constraints().audio,
                });
                Ok(())
            }
            Err(e) => {
                self.release_camera();
                Err(self.fail(e.into()))
            }
        }
    }

    /// Close the camera if open, open it otherwise; returns whether it is open
    pub async fn toggle_camera(&mut self) -> FieldCapResult<bool> {
        if self.is_camera_open() {
            self.close_camera();
            Ok(false)
        } else {
            self.open_camera().await.map(|_| true)
        }
    }

    /// Release the camera, discarding any recording in progress
    pub fn close_camera(&mut self) -> bool {
        let discarded = self.recorder.cancel();
        if discarded {
            info!("Recording discarded because the camera was closed");
        }
        self.release_camera() || discarded
    }

    /// Whether a live camera stream is held
    pub fn is_camera_open(&self) -> bool {
        self.session.is_open()
    }

    // ----- capture -----

    /// Capture one frame and close the camera
    ///
    /// When the feed is still warming up the camera stays open so the user
    /// can try again.
    pub fn capture_image(&mut self) -> FieldCapResult<&CapturedMedia> {
        self.sync_recording();
        if self.recorder.is_active() {
            return Err(self.fail(MediaError::RecordingActive.into()));
        }
        let Some(handle) = self.session.current() else {
            return Err(self.fail(FieldCapError::NotReady {
                reason: "camera is not open".to_string(),
            }));
        };

        match self.still.capture(&handle) {
            Ok(media) => {
                // The frame is only safe once it has a preview.
                let preview = self.show_preview(&media)?;
                self.release_camera();
                Ok(self.commit_media(media, preview))
            }
            Err(e @ MediaError::NotReady { .. }) => Err(self.fail(e.into())),
            Err(e) => {
                self.release_camera();
                Err(self.fail(e.into()))
            }
        }
    }

    /// Use an image picked from storage instead of the camera
    pub fn attach_image(&mut self, data: Bytes, mime_type: &str) -> FieldCapResult<&CapturedMedia> {
        self.sync_recording();
        if self.recorder.is_active() {
            return Err(self.fail(MediaError::RecordingActive.into()));
        }
        if !mime_type.starts_with("image/") {
            return Err(self.reject("file", format!("{} is not an image", mime_type)));
        }
        if data.is_empty() {
            return Err(self.reject("file", "file is empty"));
        }
        if data.len() > self.max_image_bytes {
            return Err(self.reject(
                "file",
                format!(
                    "{} bytes exceeds the {} byte limit",
                    data.len(),
                    self.max_image_bytes
                ),
            ));
        }

        let media = CapturedMedia::new(MediaKind::Image, data, mime_type)
            .map_err(|e| self.fail(e.into()))?;
        self.release_camera();
        self.set_media(media)
    }

    // ----- recording -----

    /// Start a bounded recording on the open camera
    pub async fn start_recording(&mut self) -> FieldCapResult<Uuid> {
        self.sync_recording();
        let Some(handle) = self.session.current() else {
            return Err(self.fail(FieldCapError::NotReady {
                reason: "camera is not open".to_string(),
            }));
        };

        let started = self.recorder.start(&handle).await;
        match started {
            Ok(session_id) => {
                self.last_error = None;
                Ok(session_id)
            }
            Err(e @ MediaError::RecordingActive) => Err(self.fail(e.into())),
            Err(e) => {
                self.release_camera();
                Err(self.fail(e.into()))
            }
        }
    }

    /// Pause the recording
    pub fn pause_recording(&mut self) -> FieldCapResult<()> {
        self.recorder.pause().map_err(|e| self.fail(e.into()))
    }

    /// Resume the recording
    pub fn resume_recording(&mut self) -> FieldCapResult<()> {
        self.recorder.resume().map_err(|e| self.fail(e.into()))
    }

    /// Pause or resume, whichever applies
    pub fn toggle_pause(&mut self) -> FieldCapResult<RecorderState> {
        self.recorder.toggle_pause().map_err(|e| self.fail(e.into()))
    }

    /// Stop the recording and keep the result
    pub async fn stop_recording(&mut self) -> FieldCapResult<&CapturedMedia> {
        if !self.recorder.is_active() {
            // The countdown may already have stopped it.
            return self.take_finished();
        }

        let result = self.recorder.stop().await;
        self.release_camera();
        match result {
            Ok(media) => self.set_media(media),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Wait for the countdown to end the active recording
    pub async fn wait_for_recording(&mut self) -> FieldCapResult<&CapturedMedia> {
        if !self.recorder.is_active() {
            return self.take_finished();
        }
        let outcome = self.recorder.wait_finished().await;
        self.absorb(outcome)
    }

    /// Pick up a recording the countdown finished; returns whether media changed
    pub fn sync_recording(&mut self) -> bool {
        match self.recorder.take_outcome() {
            Some(outcome) => self.absorb(outcome).is_ok(),
            None => false,
        }
    }

    /// Recorder state
    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// Seconds left in the active recording
    pub fn remaining_secs(&self) -> Option<u32> {
        self.recorder.remaining_secs()
    }

    // ----- media & upload -----

    /// Media waiting to be uploaded
    pub fn media(&self) -> Option<&CapturedMedia> {
        self.media.as_ref()
    }

    /// Preview URL of that media
    pub fn preview_url(&self) -> Option<&PreviewUrl> {
        self.preview.current()
    }

    /// Message for the most recent failure, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Upload the captured media for the selected hotel
    ///
    /// On success the form resets; on failure everything is kept for a
    /// manual retry.
    pub async fn upload(&mut self) -> FieldCapResult<UploadReceipt> {
        self.sync_recording();
        let Some(target) = self.target.clone() else {
            return Err(self.reject("hotel_id", "select a hotel first"));
        };
        let Some(media) = self.media.clone() else {
            return Err(self.reject("file", "capture or attach media first"));
        };
        if self.recorder.is_active() {
            return Err(self.fail(MediaError::RecordingActive.into()));
        }

        let request = UploadRequest {
            media,
            description: self.description.clone(),
            target_id: target.id,
            location: self.location(),
        };
        let kind = request.media.kind();

        let uploaded = self.services.uploader.upload(&request).await;
        match uploaded {
            Ok(receipt) => {
                info!("Uploaded {} for hotel {}", kind, target.id);
                self.events.publish(Event::UploadSucceeded {
                    target_id: target.id,
                    kind,
                    message: receipt.message.clone(),
                });
                self.reset();
                Ok(receipt)
            }
            Err(e) => {
                let error = FieldCapError::from(e);
                warn!("Upload for hotel {} failed: {}", target.id, error);
                self.events.publish(Event::UploadFailed {
                    reason: error.to_string(),
                });
                Err(self.fail(error))
            }
        }
    }

    /// Discard everything captured and release the camera
    pub fn cancel(&mut self) {
        self.recorder.cancel();
        self.reset();
    }

    // ----- internals -----

    fn reset(&mut self) {
        self.release_camera();
        self.media = None;
        self.preview.clear();
        self.description.clear();
        self.last_error = None;
    }

    fn set_media(&mut self, media: CapturedMedia) -> FieldCapResult<&CapturedMedia> {
        let preview = self.show_preview(&media)?;
        Ok(self.commit_media(media, preview))
    }

    fn show_preview(&mut self, media: &CapturedMedia) -> FieldCapResult<PreviewUrl> {
        self.preview
            .replace(media.data().clone(), media.mime_type())
            .map_err(|e| self.fail(e))
    }

    fn commit_media(&mut self, media: CapturedMedia, preview: PreviewUrl) -> &CapturedMedia {
        info!(
            "Captured {} ({} bytes, {})",
            media.kind(),
            media.size_bytes(),
            media.mime_type()
        );
        self.events.publish(Event::MediaCaptured {
            kind: media.kind(),
            size_bytes: media.size_bytes(),
            preview,
        });
        self.last_error = None;
        self.media.insert(media)
    }

    fn take_finished(&mut self) -> FieldCapResult<&CapturedMedia> {
        match self.recorder.take_outcome() {
            Some(outcome) => self.absorb(outcome),
            None => {
                let actual = self.recorder.state().to_string();
                Err(self.fail(FieldCapError::InvalidState {
                    expected: "recording or paused".to_string(),
                    actual,
                }))
            }
        }
    }

    fn absorb(&mut self, outcome: RecordingOutcome) -> FieldCapResult<&CapturedMedia> {
        self.release_camera();
        match outcome.result {
            Ok(media) => self.set_media(media),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Close the stream and announce it once
    fn release_camera(&mut self) -> bool {
        let closed = self.session.close_current();
        if self.camera_announced {
            self.camera_announced = false;
            self.events.publish(Event::CameraClosed);
        }
        closed
    }

    fn reject(&mut self, field: &str, reason: impl Into<String>) -> FieldCapError {
        let reason = reason.into();
        self.events.publish(Event::ValidationFailed {
            field: field.to_string(),
            reason: reason.clone(),
        });
        self.fail(FieldCapError::validation(field, reason))
    }

    fn fail(&mut self, error: FieldCapError) -> FieldCapError {
        debug!("Submission error [{}]: {}", error.error_code(), error);
        self.last_error = Some(error.to_string());
        error
    }
}

impl Drop for SubmissionScreen {
    fn drop(&mut self) {
        self.recorder.cancel();
        self.session.close_current();
        self.preview.clear();
        debug!("Submission screen torn down");
    }
}

impl std::fmt::Debug for SubmissionScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionScreen")
            .field("target", &self.target.as_ref().map(|t| t.id))
            .field("camera_open", &self.is_camera_open())
            .field("recorder", &self.recorder.state())
            .field("media", &self.media.as_ref().map(CapturedMedia::kind))
            .finish()
    }
}

//! Event system for capture and location screens

use fieldcap_api::HotelId;
use fieldcap_core::{LocationSample, PreviewUrl};
use fieldcap_media::{MediaKind, RecorderEvent, StopReason};
use futures::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Events published by the screens
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The camera stream was opened
    CameraOpened {
        /// Stream handle ID
        handle_id: Uuid,
        /// Whether the microphone is part of the stream
        with_audio: bool,
    },
    /// The camera stream was released
    CameraClosed,
    /// Media is ready for upload
    MediaCaptured {
        /// Image or video
        kind: MediaKind,
        /// Encoded size
        size_bytes: usize,
        /// Preview URL for the new media
        preview: PreviewUrl,
    },
    /// A recording began
    RecordingStarted {
        /// Recording ID
        session_id: Uuid,
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// The recording countdown advanced
    RecordingTick {
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// The recording is about to hit its ceiling
    RecordingWarning {
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// The recording was paused
    RecordingPaused,
    /// The recording was resumed
    RecordingResumed,
    /// The recording ended with media
    RecordingFinished {
        /// Recording ID
        session_id: Uuid,
        /// What ended it
        reason: StopReason,
        /// Recorded size
        size_bytes: usize,
    },
    /// The recording ended without usable media
    RecordingFailed {
        /// Recording ID
        session_id: Uuid,
        /// Failure description
        error: String,
    },
    /// The recording was discarded
    RecordingCancelled {
        /// Recording ID
        session_id: Uuid,
    },
    /// Media was accepted by the backend
    UploadSucceeded {
        /// Hotel the media was filed under
        target_id: HotelId,
        /// Image or video
        kind: MediaKind,
        /// Backend confirmation
        message: String,
    },
    /// The backend rejected the upload
    UploadFailed {
        /// Failure description
        reason: String,
    },
    /// A location cycle produced a displayable position
    LocationUpdated {
        /// Cycle number
        cycle: u64,
        /// Position shown on the map
        sample: LocationSample,
    },
    /// A location cycle failed
    LocationFailed {
        /// Cycle number
        cycle: u64,
        /// Failure description
        error: String,
    },
    /// User input was rejected
    ValidationFailed {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::CameraOpened { .. } => "camera_opened",
            Event::CameraClosed => "camera_closed",
            Event::MediaCaptured { .. } => "media_captured",
            Event::RecordingStarted { .. } => "recording_started",
            Event::RecordingTick { .. } => "recording_tick",
            Event::RecordingWarning { .. } => "recording_warning",
            Event::RecordingPaused => "recording_paused",
            Event::RecordingResumed => "recording_resumed",
            Event::RecordingFinished { .. } => "recording_finished",
            Event::RecordingFailed { .. } => "recording_failed",
            Event::RecordingCancelled { .. } => "recording_cancelled",
            Event::UploadSucceeded { .. } => "upload_succeeded",
            Event::UploadFailed { .. } => "upload_failed",
            Event::LocationUpdated { .. } => "location_updated",
            Event::LocationFailed { .. } => "location_failed",
            Event::ValidationFailed { .. } => "validation_failed",
        }
    }

    /// Check if this is a camera or captured-media event
    pub fn is_capture_event(&self) -> bool {
        matches!(
            self,
            Event::CameraOpened { .. } | Event::CameraClosed | Event::MediaCaptured { .. }
        )
    }

    /// Check if this is a recording event
    pub fn is_recording_event(&self) -> bool {
        matches!(
            self,
            Event::RecordingStarted { .. }
                | Event::RecordingTick { .. }
                | Event::RecordingWarning { .. }
                | Event::RecordingPaused
                | Event::RecordingResumed
                | Event::RecordingFinished { .. }
                | Event::RecordingFailed { .. }
                | Event::RecordingCancelled { .. }
        )
    }

    /// Check if this is an upload event
    pub fn is_upload_event(&self) -> bool {
        matches!(
            self,
            Event::UploadSucceeded { .. } | Event::UploadFailed { .. }
        )
    }

    /// Check if this is a location event
    pub fn is_location_event(&self) -> bool {
        matches!(
            self,
            Event::LocationUpdated { .. } | Event::LocationFailed { .. }
        )
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            Event::RecordingFailed { .. }
                | Event::UploadFailed { .. }
                | Event::LocationFailed { .. }
                | Event::ValidationFailed { .. }
        )
    }
}

impl From<RecorderEvent> for Event {
    fn from(event: RecorderEvent) -> Self {
        match event {
            RecorderEvent::Started {
                session_id,
                remaining_secs,
            } => Event::RecordingStarted {
                session_id,
                remaining_secs,
            },
            RecorderEvent::Tick { remaining_secs } => Event::RecordingTick { remaining_secs },
            RecorderEvent::Warning { remaining_secs } => Event::RecordingWarning { remaining_secs },
            RecorderEvent::Paused => Event::RecordingPaused,
            RecorderEvent::Resumed => Event::RecordingResumed,
            RecorderEvent::Finalized {
                session_id,
                reason,
                size_bytes,
                ..
            } => Event::RecordingFinished {
                session_id,
                reason,
                size_bytes,
            },
            RecorderEvent::Failed {
                session_id, error, ..
            } => Event::RecordingFailed { session_id, error },
            RecorderEvent::Cancelled { session_id } => Event::RecordingCancelled { session_id },
        }
    }
}

/// Fan-out point for screen events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber
    pub fn publish(&self, event: Event) {
        debug!("Event: {}", event.event_type());
        let _ = self.sender.send(event);
    }

    /// New stream receiving events published from now on
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.sender.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Stream of screen events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<Event>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event; `None` once every publisher is gone
    ///
    /// A subscriber that falls behind skips the overwritten events.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain every event that is already queued
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        futures::stream::unfold(self, |mut events| async move {
            events.next().await.map(|event| (event, events))
        })
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Whether to include camera and media events
    pub include_capture_events: bool,
    /// Whether to include recording events
    pub include_recording_events: bool,
    /// Whether to include upload events
    pub include_upload_events: bool,
    /// Whether to include location events
    pub include_location_events: bool,
    /// Whether to include error events
    pub include_error_events: bool,
    /// Specific event types to include (if specified, overrides other filters)
    pub specific_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self {
            include_capture_events: true,
            include_recording_events: true,
            include_upload_events: true,
            include_location_events: true,
            include_error_events: true,
            specific_event_types: None,
        }
    }

    fn none() -> Self {
        Self {
            include_capture_events: false,
            include_recording_events: false,
            include_upload_events: false,
            include_location_events: false,
            include_error_events: false,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only recording events
    pub fn recording_only() -> Self {
        Self {
            include_recording_events: true,
            ..Self::none()
        }
    }

    /// Create a filter that includes only location events
    pub fn location_only() -> Self {
        Self {
            include_location_events: true,
            ..Self::none()
        }
    }

    /// Create a filter that includes only error events
    pub fn errors_only() -> Self {
        Self {
            include_error_events: true,
            ..Self::none()
        }
    }

    /// Create a filter for specific event types
    pub fn specific(event_types: Vec<String>) -> Self {
        Self {
            specific_event_types: Some(event_types),
            ..Self::none()
        }
    }

    /// Check if an event should be included based on this filter
    pub fn should_include(&self, event: &Event) -> bool {
        if let Some(ref specific_types) = self.specific_event_types {
            return specific_types.iter().any(|t| t == event.event_type());
        }

        (self.include_capture_events && event.is_capture_event())
            || (self.include_recording_events && event.is_recording_event())
            || (self.include_upload_events && event.is_upload_event())
            || (self.include_location_events && event.is_location_event())
            || (self.include_error_events && event.is_error_event())
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Filtered event stream that only yields events matching a filter
#[derive(Debug)]
pub struct FilteredEventStream {
    stream: EventStream,
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a new filtered event stream
    pub fn new(stream: EventStream, filter: EventFilter) -> Self {
        Self { stream, filter }
    }

    /// Get the next event that matches the filter
    pub async fn next(&mut self) -> Option<Event> {
        while let Some(event) = self.stream.next().await {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Try to get the next filtered event without blocking
    pub fn try_next(&mut self) -> Option<Event> {
        while let Some(event) = self.stream.try_next() {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Update the filter
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    /// Get the current filter
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_classification() {
        let capture = Event::CameraClosed;
        assert!(capture.is_capture_event());
        assert!(!capture.is_recording_event());

        let tick = Event::RecordingTick { remaining_secs: 3 };
        assert!(tick.is_recording_event());
        assert!(!tick.is_error_event());

        let failed = Event::RecordingFailed {
            session_id: Uuid::new_v4(),
            error: "no data".to_string(),
        };
        assert!(failed.is_recording_event());
        assert!(failed.is_error_event());

        let location = Event::LocationFailed {
            cycle: 1,
            error: "denied".to_string(),
        };
        assert!(location.is_location_event());
        assert!(location.is_error_event());
        assert!(!location.is_upload_event());
    }

    #[test]
    fn test_event_filter() {
        let warning = Event::RecordingWarning { remaining_secs: 2 };
        let upload = Event::UploadFailed {
            reason: "offline".to_string(),
        };

        assert!(EventFilter::all().should_include(&warning));
        assert!(EventFilter::recording_only().should_include(&warning));
        assert!(!EventFilter::recording_only().should_include(&upload));
        assert!(EventFilter::errors_only().should_include(&upload));

        let specific = EventFilter::specific(vec!["upload_failed".to_string()]);
        assert!(specific.should_include(&upload));
        assert!(!specific.should_include(&warning));
    }

    #[test]
    fn test_recorder_event_mapping() {
        let session_id = Uuid::new_v4();
        let mapped = Event::from(RecorderEvent::Finalized {
            session_id,
            reason: StopReason::CeilingReached,
            size_bytes: 2048,
            fragments: 2,
        });
        assert_eq!(
            mapped,
            Event::RecordingFinished {
                session_id,
                reason: StopReason::CeilingReached,
                size_bytes: 2048,
            }
        );
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_other_events() {
        let bus = EventBus::default();
        let mut filtered = FilteredEventStream::new(bus.subscribe(), EventFilter::location_only());

        bus.publish(Event::CameraClosed);
        bus.publish(Event::LocationFailed {
            cycle: 2,
            error: "timeout".to_string(),
        });

        assert_eq!(
            filtered.next().await.map(|e| e.event_type()),
            Some("location_failed")
        );
        assert!(filtered.try_next().is_none());
    }
}

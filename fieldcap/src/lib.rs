//! # Field Capture
//!
//! Media capture and live location for field inspections. A worker picks a
//! hotel, photographs or records what they find (recordings are capped at
//! a fixed ceiling, 28 seconds by default), and uploads it with a
//! description. A separate screen publishes the worker's position on a
//! fixed schedule and shows it on a map.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fieldcap::{FieldCap, FieldCapConfig, SubmissionServices};
//! use fieldcap::{SyntheticBackend, RecordingUploader, StaticHotelDirectory, HotelSummary};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let field_cap = FieldCap::init_with(FieldCapConfig::from_env()?)?;
//!
//!     let mut screen = field_cap.submission_screen(SubmissionServices {
//!         capture: Arc::new(SyntheticBackend::new()),
//!         uploader: Arc::new(RecordingUploader::new()),
//!         hotels: Arc::new(StaticHotelDirectory::new(vec![HotelSummary {
//!             id: 1,
//!             name: "Hotel A".to_string(),
//!             city: None,
//!             address: None,
//!             is_active: true,
//!         }])),
//!         geolocator: None,
//!     })?;
//!
//!     screen.load_hotels().await?;
//!     screen.select_target(1)?;
//!     screen.open_camera().await?;
//!     screen.start_recording().await?;
//!     screen.wait_for_recording().await?;
//!     screen.upload().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export the building blocks
pub use fieldcap_api::{
    ApiClientConfig, ApiError, HotelDirectory, HotelId, HotelSummary, HttpApiClient,
    MediaUploader, RecordingUploader, StaticHotelDirectory, UploadReceipt, UploadRequest,
};
pub use fieldcap_core::{
    Coordinates, FieldCapError, FieldCapResult, LocationSample, PreviewRegistry, PreviewUrl,
    ResourceKind, ResourceLedger, ResourceLimits, ResourceUsage,
};
pub use fieldcap_location::{
    CycleReport, FollowPolicy, Geolocator, InMemoryLocationSink, LiveMapView, LocationError,
    LocationPublisher, LocationSink, MapRenderer, MapViewport, RecordingMapRenderer,
    ScriptedGeolocator,
};
pub use fieldcap_media::{
    BoundedRecorder, CaptureBackend, CapturedMedia, DeviceStreamHandle, MediaDeviceSession,
    MediaError, MediaKind, RecorderState, StillCapture, StopReason, StreamConstraints,
    SyntheticBackend, SyntheticConfig,
};

// Public API modules
pub mod config;
pub mod event;
pub mod location_screen;
pub mod logging;
pub mod submission;

// Re-export main API types
pub use config::FieldCapConfig;
pub use event::{Event, EventBus, EventFilter, EventStream, FilteredEventStream};
pub use location_screen::{LocationScreen, LocationServices, LocationStatus};
pub use logging::init_logging;
pub use submission::{SubmissionScreen, SubmissionServices};

use std::sync::Arc;
use tracing::info;

/// Main entry point for field capture
///
/// Holds the configuration and the resources every screen shares: the
/// ledger that allows a single live camera stream across the whole app,
/// and the registry of preview URLs.
#[derive(Debug, Clone)]
pub struct FieldCap {
    inner: Arc<FieldCapInner>,
}

#[derive(Debug)]
struct FieldCapInner {
    config: FieldCapConfig,
    ledger: ResourceLedger,
    previews: PreviewRegistry,
}

impl FieldCap {
    /// Initialize with default configuration
    pub fn init() -> FieldCapResult<Self> {
        Self::init_with(FieldCapConfig::default())
    }

    /// Initialize with custom configuration
    pub fn init_with(config: FieldCapConfig) -> FieldCapResult<Self> {
        config.validate()?;

        let ledger = ResourceLedger::new(ResourceLimits::single_camera());
        let previews = PreviewRegistry::new(ledger.clone());
        info!(
            "Field capture initialized (backend {}, {}s recordings)",
            config.api_base_url, config.recording_ceiling_secs
        );

        Ok(Self {
            inner: Arc::new(FieldCapInner {
                config,
                ledger,
                previews,
            }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &FieldCapConfig {
        &self.inner.config
    }

    /// Shared resource ledger
    pub fn ledger(&self) -> &ResourceLedger {
        &self.inner.ledger
    }

    /// Shared preview URL registry
    pub fn previews(&self) -> &PreviewRegistry {
        &self.inner.previews
    }

    /// Live and peak resource counts
    pub fn resource_usage(&self) -> ResourceUsage {
        self.inner.ledger.usage()
    }

    /// Backend client built from the configuration
    pub fn http_client(&self) -> FieldCapResult<HttpApiClient> {
        Ok(HttpApiClient::new(self.inner.config.api_client_config())?)
    }

    /// Mount a media submission screen
    pub fn submission_screen(
        &self,
        services: SubmissionServices,
    ) -> FieldCapResult<SubmissionScreen> {
        SubmissionScreen::new(
            &self.inner.config,
            services,
            self.inner.ledger.clone(),
            self.inner.previews.clone(),
        )
    }

    /// Mount a live location screen; the first cycle runs immediately
    pub fn location_screen(&self, services: LocationServices) -> FieldCapResult<LocationScreen> {
        LocationScreen::open(&self.inner.config, services, self.inner.ledger.clone())
    }
}

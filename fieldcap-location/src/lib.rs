//! # Field Capture Location
//!
//! Live location for field capture: a publisher that samples the device
//! position on a fixed schedule, pushes it to the store of record and reads
//! back the authoritative value, and a map view that follows it.

#![warn(clippy::all)]

pub mod capability;
pub mod error;
pub mod map;
pub mod memory;
pub mod publisher;

// Re-export main types
pub use capability::{Geolocator, LocationSink};
pub use error::{LocationError, LocationResult};
pub use map::{FollowPolicy, LiveMapView, MapConfig, MapRenderer, MapViewport, MAX_ZOOM, MIN_ZOOM};
pub use memory::{InMemoryLocationSink, RecordingMapRenderer, ScriptedGeolocator, SinkCall};
pub use publisher::{
    CycleReport, LocationPublisher, PublisherConfig, PublisherEvent, DEFAULT_PUBLISH_INTERVAL,
};

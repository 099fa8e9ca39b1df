//! Platform and backend capabilities the location flow depends on

use crate::error::LocationResult;
use async_trait::async_trait;
use fieldcap_core::LocationSample;

/// Device geolocation
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Current position; fails with `PositionUnavailable` when denied or no fix
    async fn current_position(&self) -> LocationResult<LocationSample>;
}

/// Remote store of record for location samples
#[async_trait]
pub trait LocationSink: Send + Sync {
    /// Store a position
    async fn push(&self, latitude: f64, longitude: f64) -> LocationResult<()>;

    /// Read back the stored position, with the store's timestamp
    async fn fetch_latest(&self) -> LocationResult<LocationSample>;
}

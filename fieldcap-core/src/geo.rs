//! Geographic types shared by the location and upload paths

use crate::error::{FieldCapError, FieldCapResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90..=90
    pub latitude: f64,
    /// Longitude, -180..=180
    pub longitude: f64,
}

impl Coordinates {
    /// Create and validate a coordinate pair
    pub fn new(latitude: f64, longitude: f64) -> FieldCapResult<Self> {
        let coordinates = Self {
            latitude,
            longitude,
        };
        coordinates.validate()?;
        Ok(coordinates)
    }

    /// Check that both values are finite and in range
    pub fn validate(&self) -> FieldCapResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FieldCapError::validation(
                "latitude",
                format!("{} is outside -90..=90", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FieldCapError::validation(
                "longitude",
                format!("{} is outside -180..=180", self.longitude),
            ));
        }
        Ok(())
    }
}

/// One position reading
///
/// Samples read back from the location sink carry the sink's timestamp,
/// which takes precedence over the time the device took the reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// When the position was captured (or stored, for sink readbacks)
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    /// Sample taken now
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
        }
    }

    /// Coordinates of this sample
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

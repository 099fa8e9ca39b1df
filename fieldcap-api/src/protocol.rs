//! Wire types for the inspection backend
//!
//! Field names follow the backend's JSON. Timestamps arrive in whatever
//! form the backend's serializer picks; [`parse_server_timestamp`] accepts
//! RFC 2822 (the default rendering), RFC 3339, and naive ISO-8601 in UTC.

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use fieldcap_core::{Coordinates, LocationSample};
use serde::{Deserialize, Serialize};

/// Hotel identifier
pub type HotelId = u64;

fn default_active() -> bool {
    true
}

/// One entry of the hotel listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelSummary {
    /// Hotel ID
    pub id: HotelId,
    /// Display name
    pub name: String,
    /// City name, when the listing includes it
    #[serde(default)]
    pub city: Option<String>,
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
    /// Inactive hotels cannot receive uploads
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Body of `POST /location`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPush {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
}

impl From<Coordinates> for LocationPush {
    fn from(coordinates: Coordinates) -> Self {
        Self {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }
}

/// Body of `GET /location`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Stored latitude
    pub latitude: f64,
    /// Stored longitude
    pub longitude: f64,
    /// When the backend stored it
    pub timestamp: String,
    /// Same instant rendered in local time, informational
    #[serde(default)]
    pub timestamp_ist: Option<String>,
}

impl LocationRecord {
    /// Convert to a sample stamped with the backend's time
    pub fn into_sample(self) -> ApiResult<LocationSample> {
        let captured_at =
            parse_server_timestamp(&self.timestamp).ok_or_else(|| ApiError::Decode {
                reason: format!("unrecognised timestamp {:?}", self.timestamp),
            })?;
        Ok(LocationSample {
            latitude: self.latitude,
            longitude: self.longitude,
            captured_at,
        })
    }
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error message
    #[serde(alias = "message", alias = "msg")]
    pub error: String,
}

/// Success body of `POST /worker/upload_media`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Confirmation message
    #[serde(default)]
    pub message: String,
}

/// Parse a backend timestamp into UTC
pub fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 3, 9, 30, 15).unwrap();
        assert_eq!(
            parse_server_timestamp("Tue, 03 Jun 2025 09:30:15 GMT"),
            Some(expected)
        );
        assert_eq!(
            parse_server_timestamp("2025-06-03T15:00:15+05:30"),
            Some(expected)
        );
        assert_eq!(
            parse_server_timestamp("2025-06-03T09:30:15"),
            Some(expected)
        );
        assert_eq!(
            parse_server_timestamp("2025-06-03 09:30:15"),
            Some(expected)
        );
        assert_eq!(parse_server_timestamp("yesterday"), None);
    }

    #[test]
    fn test_hotel_defaults() {
        let hotel: HotelSummary =
            serde_json::from_str(r#"{"id": 7, "name": "Shivneri", "phone": "123"}"#).unwrap();
        assert!(hotel.is_active);
        assert_eq!(hotel.city, None);
    }

    #[test]
    fn test_location_record_into_sample() {
        let record: LocationRecord = serde_json::from_str(
            r#"{"latitude": 18.5, "longitude": 73.8, "timestamp": "Tue, 03 Jun 2025 09:30:15 GMT", "timestamp_ist": "2025-06-03 15:00:15"}"#,
        )
        .unwrap();
        let sample = record.into_sample().unwrap();
        assert_eq!(sample.latitude, 18.5);
        assert_eq!(
            sample.captured_at,
            Utc.with_ymd_and_hms(2025, 6, 3, 9, 30, 15).unwrap()
        );
    }

    #[test]
    fn test_error_body_aliases() {
        let body: ErrorBody = serde_json::from_str(r#"{"msg": "Token has expired"}"#).unwrap();
        assert_eq!(body.error, "Token has expired");
    }
}

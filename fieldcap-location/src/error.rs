//! Location error types

use fieldcap_core::FieldCapError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by geolocation, the location sink and the map view
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// The platform could not provide a position (denied, no fix)
    #[error("Position unavailable: {reason}")]
    PositionUnavailable {
        /// Failure reason
        reason: String,
    },

    /// No position arrived within the timeout
    #[error("Position request timed out after {after:?}")]
    Timeout {
        /// Timeout that elapsed
        after: Duration,
    },

    /// Sending a sample to the sink failed
    #[error("Location push failed: {reason}")]
    Push {
        /// Failure reason
        reason: String,
    },

    /// Reading the stored location failed
    #[error("Location fetch failed: {reason}")]
    Fetch {
        /// Failure reason
        reason: String,
    },

    /// The sink holds no location yet
    #[error("No stored location")]
    NoStoredLocation,

    /// Coordinates out of range
    #[error("Invalid coordinates: {reason}")]
    InvalidCoordinates {
        /// Failure reason
        reason: String,
    },

    /// Publisher is already running
    #[error("Location publisher already running")]
    AlreadyRunning,

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for location operations
pub type LocationResult<T> = Result<T, LocationError>;

impl LocationError {
    /// Whether the failure came from the device rather than the sink
    pub fn is_position_error(&self) -> bool {
        matches!(
            self,
            LocationError::PositionUnavailable { .. } | LocationError::Timeout { .. }
        )
    }
}

impl From<LocationError> for FieldCapError {
    fn from(error: LocationError) -> Self {
        match error {
            LocationError::PositionUnavailable { reason } => {
                FieldCapError::PositionUnavailable { reason }
            }
            LocationError::Timeout { after } => FieldCapError::PositionUnavailable {
                reason: format!("timed out after {:?}", after),
            },
            e @ (LocationError::Push { .. }
            | LocationError::Fetch { .. }
            | LocationError::NoStoredLocation) => FieldCapError::LocationSink {
                reason: e.to_string(),
            },
            LocationError::InvalidCoordinates { reason } => FieldCapError::ValidationFailed {
                field: "location".to_string(),
                reason,
            },
            LocationError::AlreadyRunning => FieldCapError::InvalidState {
                expected: "stopped publisher".to_string(),
                actual: "running".to_string(),
            },
            LocationError::InvalidConfiguration { message } => FieldCapError::Configuration {
                field: "location".to_string(),
                reason: message,
            },
        }
    }
}

impl From<FieldCapError> for LocationError {
    fn from(error: FieldCapError) -> Self {
        match error {
            FieldCapError::ValidationFailed { field, reason } => LocationError::InvalidCoordinates {
                reason: format!("{}: {}", field, reason),
            },
            other => LocationError::PositionUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

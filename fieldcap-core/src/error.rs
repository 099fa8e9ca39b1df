//! Error types for field capture

use std::time::Duration;
use thiserror::Error;

/// Main error type for field capture operations
///
/// This is the taxonomy surfaced to the user. Crate-level errors
/// (`MediaError`, `LocationError`, `ApiError`) convert into it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldCapError {
    /// Camera, microphone or geolocation access was refused
    #[error("Permission denied: {capability}")]
    PermissionDenied {
        /// Capability that was refused (camera, microphone, geolocation)
        capability: String,
    },

    /// Requested hardware is not present or is held elsewhere
    #[error("Device unavailable: {device}: {reason}")]
    DeviceUnavailable {
        /// Device that could not be acquired
        device: String,
        /// Reason the device is unavailable
        reason: String,
    },

    /// Capture attempted before the stream warmed up
    #[error("Camera not ready: {reason}")]
    NotReady {
        /// What has not happened yet
        reason: String,
    },

    /// The finalized recording contained zero bytes
    #[error("Recording failed or was too short: no data was captured")]
    EmptyRecording,

    /// Geolocation failed or timed out
    #[error("Position unavailable: {reason}")]
    PositionUnavailable {
        /// Reason the position could not be read
        reason: String,
    },

    /// The upload collaborator rejected or could not receive the media
    #[error("Upload failed: {reason}")]
    UploadFailed {
        /// Reason for the failure
        reason: String,
        /// HTTP status, when the backend answered
        status: Option<u16>,
    },

    /// A required field is missing or invalid
    #[error("Validation failed: {field}: {reason}")]
    ValidationFailed {
        /// Field that failed validation
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Remote location sink could not be reached or answered with an error
    #[error("Location sink error: {reason}")]
    LocationSink {
        /// Reason for the failure
        reason: String,
    },

    /// Operation not valid in the current state
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Resource limit exceeded
    #[error("Resource limit exceeded: {resource}")]
    ResourceLimit {
        /// Resource that exceeded its limit
        resource: String,
    },

    /// Operation timed out
    #[error("Operation timed out: {operation} after {duration:?}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Duration after which the timeout occurred
        duration: Duration,
    },

    /// Invalid or missing configuration
    #[error("Invalid configuration: {field}: {reason}")]
    Configuration {
        /// Offending configuration field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },
}

impl FieldCapError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            FieldCapError::PermissionDenied { .. } => "PERMISSION_DENIED",
            FieldCapError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            FieldCapError::NotReady { .. } => "NOT_READY",
            FieldCapError::EmptyRecording => "EMPTY_RECORDING",
            FieldCapError::PositionUnavailable { .. } => "POSITION_UNAVAILABLE",
            FieldCapError::UploadFailed { .. } => "UPLOAD_FAILED",
            FieldCapError::ValidationFailed { .. } => "VALIDATION_FAILED",
            FieldCapError::LocationSink { .. } => "LOCATION_SINK_ERROR",
            FieldCapError::InvalidState { .. } => "INVALID_STATE",
            FieldCapError::ResourceLimit { .. } => "RESOURCE_LIMIT_EXCEEDED",
            FieldCapError::Timeout { .. } => "TIMEOUT",
            FieldCapError::Configuration { .. } => "INVALID_CONFIGURATION",
            FieldCapError::Initialization { .. } => "INITIALIZATION_FAILED",
        }
    }

    /// Whether the user can retry the same action without changing anything
    pub fn is_recoverable(&self) -> bool {
        match self {
            FieldCapError::NotReady { .. }
            | FieldCapError::EmptyRecording
            | FieldCapError::PositionUnavailable { .. }
            | FieldCapError::UploadFailed { .. }
            | FieldCapError::LocationSink { .. }
            | FieldCapError::Timeout { .. }
            | FieldCapError::DeviceUnavailable { .. } => true,
            FieldCapError::PermissionDenied { .. }
            | FieldCapError::ValidationFailed { .. }
            | FieldCapError::InvalidState { .. }
            | FieldCapError::ResourceLimit { .. }
            | FieldCapError::Configuration { .. }
            | FieldCapError::Initialization { .. } => false,
        }
    }

    /// Whether the error came from camera, microphone or geolocation hardware
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            FieldCapError::PermissionDenied { .. }
                | FieldCapError::DeviceUnavailable { .. }
                | FieldCapError::NotReady { .. }
                | FieldCapError::EmptyRecording
                | FieldCapError::PositionUnavailable { .. }
        )
    }

    /// Shorthand for a validation failure
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldCapError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using FieldCapError
pub type FieldCapResult<T> = Result<T, FieldCapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(FieldCapError::EmptyRecording.error_code(), "EMPTY_RECORDING");
        assert_eq!(
            FieldCapError::validation("target", "no hotel selected").error_code(),
            "VALIDATION_FAILED"
        );
        assert_eq!(
            FieldCapError::PositionUnavailable {
                reason: "timeout".to_string()
            }
            .error_code(),
            "POSITION_UNAVAILABLE"
        );
    }

    #[test]
    fn test_hardware_classification() {
        let denied = FieldCapError::PermissionDenied {
            capability: "camera".to_string(),
        };
        assert!(denied.is_hardware());
        assert!(!denied.is_recoverable());

        let upload = FieldCapError::UploadFailed {
            reason: "bad gateway".to_string(),
            status: Some(502),
        };
        assert!(!upload.is_hardware());
        assert!(upload.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = FieldCapError::ValidationFailed {
            field: "media".to_string(),
            reason: "nothing captured".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Validation failed: media: nothing captured"
        );
    }
}

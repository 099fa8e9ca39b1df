//! Media capture error types and handling
//!
//! This module defines the error types used by device sessions, still capture
//! and recording, and how they map onto the user-facing taxonomy.

use fieldcap_core::FieldCapError;
use thiserror::Error;

/// Main error type for media capture operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// The platform refused access to the device
    #[error("Permission denied: {device}")]
    PermissionDenied {
        /// Device that was refused (camera, microphone)
        device: String,
    },

    /// The requested hardware is missing or held elsewhere
    #[error("Device unavailable: {device} - {reason}")]
    DeviceUnavailable {
        /// Device that could not be acquired
        device: String,
        /// Failure reason
        reason: String,
    },

    /// The video feed has not produced frame metadata yet
    #[error("Camera not ready: {reason}")]
    NotReady {
        /// What is missing
        reason: String,
    },

    /// Finalized recording had zero bytes
    #[error("Empty recording")]
    EmptyRecording,

    /// Operation on a handle that has already been closed
    #[error("Device handle {handle_id} is closed")]
    HandleClosed {
        /// Handle identifier
        handle_id: String,
    },

    /// The handle lacks a track the operation needs
    #[error("Missing {kind} track")]
    MissingTrack {
        /// Track kind ("video" or "audio")
        kind: String,
    },

    /// A recording is already running for this recorder
    #[error("A recording is already in progress")]
    RecordingActive,

    /// Invalid state for operation
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Media kind does not match its payload
    #[error("Invalid media type: expected {expected}, got {actual}")]
    InvalidMediaType {
        /// Expected media type
        expected: String,
        /// Actual media type
        actual: String,
    },

    /// Encoding operation failed
    #[error("Encoding failed: {format} - {reason}")]
    EncodingFailed {
        /// Target format
        format: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Resource not available
    #[error("Resource not available: {resource}")]
    ResourceNotAvailable {
        /// Resource name
        resource: String,
    },

    /// Failure reported by the capture backend
    #[error("Capture backend error: {backend} - {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::NotReady { .. } => true,
            MediaError::EmptyRecording => true,
            MediaError::DeviceUnavailable { .. } => true,
            MediaError::ResourceNotAvailable { .. } => true,
            MediaError::Backend { .. } => true,
            MediaError::PermissionDenied { .. } => false,
            MediaError::EncodingFailed { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::PermissionDenied { .. } => ErrorCategory::Permission,
            MediaError::DeviceUnavailable { .. } => ErrorCategory::Device,
            MediaError::NotReady { .. } => ErrorCategory::Device,
            MediaError::EmptyRecording => ErrorCategory::Data,
            MediaError::HandleClosed { .. } => ErrorCategory::State,
            MediaError::MissingTrack { .. } => ErrorCategory::Device,
            MediaError::RecordingActive => ErrorCategory::State,
            MediaError::InvalidState { .. } => ErrorCategory::State,
            MediaError::InvalidMediaType { .. } => ErrorCategory::Format,
            MediaError::EncodingFailed { .. } => ErrorCategory::Codec,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::ResourceNotAvailable { .. } => ErrorCategory::System,
            MediaError::Backend { .. } => ErrorCategory::System,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Access refused by the platform
    Permission,
    /// Device and hardware errors
    Device,
    /// State management errors
    State,
    /// Data validation errors
    Data,
    /// Format and data structure errors
    Format,
    /// Encoder errors
    Codec,
    /// Configuration and parameter errors
    Configuration,
    /// System-level errors
    System,
}

impl From<MediaError> for FieldCapError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::PermissionDenied { device } => {
                FieldCapError::PermissionDenied { capability: device }
            }
            MediaError::DeviceUnavailable { device, reason } => {
                FieldCapError::DeviceUnavailable { device, reason }
            }
            MediaError::MissingTrack { kind } => FieldCapError::DeviceUnavailable {
                device: kind,
                reason: "track not present in the stream".to_string(),
            },
            MediaError::NotReady { reason } => FieldCapError::NotReady { reason },
            MediaError::EmptyRecording => FieldCapError::EmptyRecording,
            MediaError::HandleClosed { handle_id } => FieldCapError::InvalidState {
                expected: "open camera".to_string(),
                actual: format!("handle {} closed", handle_id),
            },
            MediaError::RecordingActive => FieldCapError::InvalidState {
                expected: "idle recorder".to_string(),
                actual: "recording".to_string(),
            },
            MediaError::InvalidState { expected, actual } => {
                FieldCapError::InvalidState { expected, actual }
            }
            MediaError::ResourceNotAvailable { resource } => {
                FieldCapError::ResourceLimit { resource }
            }
            MediaError::InvalidConfiguration { message } => FieldCapError::Configuration {
                field: "media".to_string(),
                reason: message,
            },
            other @ (MediaError::InvalidMediaType { .. }
            | MediaError::EncodingFailed { .. }
            | MediaError::InvalidFrameData { .. }
            | MediaError::Backend { .. }) => FieldCapError::DeviceUnavailable {
                device: "camera".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let denied = MediaError::PermissionDenied {
            device: "camera".to_string(),
        };
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert!(!denied.is_recoverable());

        let not_ready = MediaError::NotReady {
            reason: "metadata not loaded".to_string(),
        };
        assert_eq!(not_ready.category(), ErrorCategory::Device);
        assert!(not_ready.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = MediaError::InvalidFrameData {
            expected: 1024,
            actual: 512,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame data: expected 1024 bytes, got 512"
        );
    }

    #[test]
    fn test_conversion_into_taxonomy() {
        let converted: FieldCapError = MediaError::EmptyRecording.into();
        assert_eq!(converted, FieldCapError::EmptyRecording);

        let converted: FieldCapError = MediaError::PermissionDenied {
            device: "microphone".to_string(),
        }
        .into();
        assert_eq!(converted.error_code(), "PERMISSION_DENIED");

        let converted: FieldCapError = MediaError::NotReady {
            reason: "warming up".to_string(),
        }
        .into();
        assert_eq!(converted.error_code(), "NOT_READY");
    }
}

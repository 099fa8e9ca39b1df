//! Backend API error types

use fieldcap_core::FieldCapError;
use thiserror::Error;

/// Errors raised while talking to the inspection backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Request never got a response
    #[error("Network error: {reason}")]
    Network {
        /// Failure reason
        reason: String,
    },

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or the raw body
        message: String,
    },

    /// Response body could not be decoded
    #[error("Invalid response: {reason}")]
    Decode {
        /// Failure reason
        reason: String,
    },

    /// Request rejected before sending
    #[error("Invalid request: {field} - {reason}")]
    InvalidRequest {
        /// Offending field
        field: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid client configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status, when the backend answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend reported a missing resource
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether retrying later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Network { .. } => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode {
                reason: error.to_string(),
            }
        } else {
            ApiError::Network {
                reason: error.to_string(),
            }
        }
    }
}

impl From<ApiError> for FieldCapError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::InvalidRequest { field, reason } => {
                FieldCapError::ValidationFailed { field, reason }
            }
            ApiError::InvalidConfiguration { message } => FieldCapError::Configuration {
                field: "api".to_string(),
                reason: message,
            },
            ApiError::Status { status, message } => FieldCapError::UploadFailed {
                reason: message,
                status: Some(status),
            },
            other => FieldCapError::UploadFailed {
                reason: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let error = ApiError::Status {
            status: 403,
            message: "Cannot upload to inactive hotel".to_string(),
        };
        assert!(!error.is_recoverable());

        let converted: FieldCapError = error.into();
        assert_eq!(
            converted,
            FieldCapError::UploadFailed {
                reason: "Cannot upload to inactive hotel".to_string(),
                status: Some(403)
            }
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(ApiError::Network {
            reason: "refused".to_string()
        }
        .is_recoverable());
        assert!(ApiError::Status {
            status: 503,
            message: String::new()
        }
        .is_recoverable());
        assert!(ApiError::Status {
            status: 404,
            message: String::new()
        }
        .is_not_found());
    }
}

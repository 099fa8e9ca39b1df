//! Backend collaborators used by the capture screens
//!
//! The submission screen talks to the backend only through these traits,
//! so it can run against the HTTP client or the in-memory stand-ins below.

use crate::error::{ApiError, ApiResult};
use crate::protocol::{HotelId, HotelSummary, UploadReceipt};
use async_trait::async_trait;
use fieldcap_core::Coordinates;
use fieldcap_media::CapturedMedia;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// Everything sent with one media upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// The image or recording
    pub media: CapturedMedia,
    /// Free-text description
    pub description: String,
    /// Hotel the media belongs to
    pub target_id: HotelId,
    /// Where the media was captured, if known
    pub location: Option<Coordinates>,
}

impl UploadRequest {
    /// Reject requests the backend would refuse outright
    pub fn validate(&self) -> ApiResult<()> {
        if self.media.size_bytes() == 0 {
            return Err(ApiError::InvalidRequest {
                field: "file".to_string(),
                reason: "media is empty".to_string(),
            });
        }
        if let Some(location) = &self.location {
            location.validate().map_err(|e| ApiError::InvalidRequest {
                field: "location".to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Accepts captured media
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload one item; failures are not retried
    async fn upload(&self, request: &UploadRequest) -> ApiResult<UploadReceipt>;
}

/// Lists hotels media can be attached to
#[async_trait]
pub trait HotelDirectory: Send + Sync {
    /// All hotels visible to the current user
    async fn list_hotels(&self) -> ApiResult<Vec<HotelSummary>>;
}

/// Uploader that keeps every request in memory
#[derive(Debug, Default)]
pub struct RecordingUploader {
    uploads: Mutex<Vec<UploadRequest>>,
    failures: Mutex<VecDeque<ApiError>>,
}

impl RecordingUploader {
    /// Uploader that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next upload with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.failures.lock().push_back(error);
    }

    /// Accepted uploads, in order
    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().clone()
    }

    /// Number of accepted uploads
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }
}

#[async_trait]
impl MediaUploader for RecordingUploader {
    async fn upload(&self, request: &UploadRequest) -> ApiResult<UploadReceipt> {
        request.validate()?;
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        debug!(
            "Recorded upload of {} for hotel {}",
            request.media.file_name(),
            request.target_id
        );
        self.uploads.lock().push(request.clone());
        Ok(UploadReceipt {
            message: "Media uploaded successfully".to_string(),
        })
    }
}

/// Fixed hotel listing
#[derive(Debug, Default)]
pub struct StaticHotelDirectory {
    hotels: Vec<HotelSummary>,
}

impl StaticHotelDirectory {
    /// Directory serving `hotels`
    pub fn new(hotels: Vec<HotelSummary>) -> Self {
        Self { hotels }
    }
}

#[async_trait]
impl HotelDirectory for StaticHotelDirectory {
    async fn list_hotels(&self) -> ApiResult<Vec<HotelSummary>> {
        Ok(self.hotels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use fieldcap_media::MediaKind;

    fn request() -> UploadRequest {
        UploadRequest {
            media: CapturedMedia::new(MediaKind::Image, Bytes::from_static(b"png"), "image/png")
                .unwrap(),
            description: "Kitchen".to_string(),
            target_id: 3,
            location: None,
        }
    }

    #[tokio::test]
    async fn test_recording_uploader_failure_then_success() {
        let uploader = RecordingUploader::new();
        uploader.fail_next(ApiError::Status {
            status: 500,
            message: "Failed to save file".to_string(),
        });

        assert!(uploader.upload(&request()).await.is_err());
        assert_eq!(uploader.upload_count(), 0);

        uploader.upload(&request()).await.unwrap();
        let uploads = uploader.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].description, "Kitchen");
        assert_eq!(uploads[0].target_id, 3);
    }

    #[test]
    fn test_invalid_location_rejected() {
        let mut request = request();
        request.location = Some(Coordinates {
            latitude: 123.0,
            longitude: 0.0,
        });
        assert!(matches!(
            request.validate(),
            Err(ApiError::InvalidRequest { .. })
        ));
    }
}

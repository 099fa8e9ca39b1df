//! # Field Capture API
//!
//! Backend collaborators for field capture: media upload, the hotel listing
//! that upload targets come from, and the location store of record. The
//! [`HttpApiClient`] implements all three against the REST backend.

#![warn(clippy::all)]

pub mod client;
pub mod collaborators;
pub mod error;
pub mod protocol;

// Re-export main types
pub use client::{ApiClientConfig, HttpApiClient, DEFAULT_BASE_URL};
pub use collaborators::{
    HotelDirectory, MediaUploader, RecordingUploader, StaticHotelDirectory, UploadRequest,
};
pub use error::{ApiError, ApiResult};
pub use protocol::{
    parse_server_timestamp, ErrorBody, HotelId, HotelSummary, LocationPush, LocationRecord,
    UploadReceipt,
};

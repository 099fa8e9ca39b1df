//! Captured media payloads

use crate::error::{MediaError, MediaResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Audio/video recording
    Video,
}

impl MediaKind {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            MediaKind::Image => "photo",
            MediaKind::Video => "recording",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image or recording ready for preview and upload
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMedia {
    id: Uuid,
    kind: MediaKind,
    data: Bytes,
    mime_type: String,
    captured_at: DateTime<Utc>,
}

impl CapturedMedia {
    /// Wrap encoded bytes; empty payloads are rejected
    pub fn new(kind: MediaKind, data: Bytes, mime_type: impl Into<String>) -> MediaResult<Self> {
        let mime_type = mime_type.into();
        let prefix = format!("{}/", kind.as_str());
        if !mime_type.starts_with(&prefix) {
            return Err(MediaError::InvalidMediaType {
                expected: format!("{}*", prefix),
                actual: mime_type,
            });
        }
        if data.is_empty() {
            return Err(match kind {
                MediaKind::Video => MediaError::EmptyRecording,
                MediaKind::Image => MediaError::EncodingFailed {
                    format: mime_type,
                    reason: "image has no data".to_string(),
                },
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            data,
            mime_type,
            captured_at: Utc::now(),
        })
    }

    /// Media identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Encoded bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// MIME type of the encoded bytes
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Capture time
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Payload size
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// File name used for multipart upload, e.g. `photo.jpg`
    pub fn file_name(&self) -> String {
        let subtype = self
            .mime_type
            .split_once('/')
            .map(|(_, rest)| rest.split(';').next().unwrap_or(rest).trim())
            .unwrap_or("bin");
        let extension = match subtype {
            "jpeg" => "jpg",
            "quicktime" => "mov",
            "svg+xml" => "svg",
            other => other,
        };
        format!("{}.{}", self.kind.file_stem(), extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let photo = CapturedMedia::new(MediaKind::Image, Bytes::from_static(b"png"), "image/png")
            .unwrap();
        assert_eq!(photo.file_name(), "photo.png");

        let clip = CapturedMedia::new(
            MediaKind::Video,
            Bytes::from_static(b"webm"),
            "video/webm;codecs=vp8,opus",
        )
        .unwrap();
        assert_eq!(clip.file_name(), "recording.webm");

        let jpeg =
            CapturedMedia::new(MediaKind::Image, Bytes::from_static(b"jpg"), "image/jpeg").unwrap();
        assert_eq!(jpeg.file_name(), "photo.jpg");
    }

    #[test]
    fn test_empty_payloads_rejected() {
        assert_eq!(
            CapturedMedia::new(MediaKind::Video, Bytes::new(), "video/webm"),
            Err(MediaError::EmptyRecording)
        );
        assert!(matches!(
            CapturedMedia::new(MediaKind::Image, Bytes::new(), "image/png"),
            Err(MediaError::EncodingFailed { .. })
        ));
    }

    #[test]
    fn test_kind_must_match_mime() {
        let result = CapturedMedia::new(MediaKind::Image, Bytes::from_static(b"x"), "video/webm");
        assert!(matches!(result, Err(MediaError::InvalidMediaType { .. })));
    }
}

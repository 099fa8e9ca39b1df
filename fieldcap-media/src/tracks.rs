//! Track abstractions and video frame types

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track kinds carried by a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone track
    Audio,
    /// Camera track
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Description of one track in a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track ID
    pub id: String,
    /// Track kind
    pub kind: TrackKind,
    /// Human readable device label
    pub label: String,
}

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl VideoResolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 320x240
    pub const QVGA: Self = Self::new(320, 240);
    /// 640x480
    pub const VGA: Self = Self::new(640, 480);
    /// 1280x720
    pub const HD: Self = Self::new(1280, 720);

    /// Whether either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One rasterized video frame, 8-bit RGB, row-major
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGB24 pixel data
    pub data: Vec<u8>,
    /// Timestamp in milliseconds
    pub timestamp: u64,
}

impl VideoFrame {
    /// Bytes per RGB24 pixel
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Resolution of the frame
    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.width, self.height)
    }

    /// Check that the buffer matches the dimensions
    pub fn validate(&self) -> Result<(), MediaError> {
        let expected = self.resolution().pixel_count() * Self::BYTES_PER_PIXEL;
        if expected == 0 || self.data.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_helpers() {
        assert_eq!(VideoResolution::QVGA.pixel_count(), 320 * 240);
        assert!(VideoResolution::new(0, 480).is_empty());
        assert_eq!(VideoResolution::VGA.to_string(), "640x480");
    }

    #[test]
    fn test_frame_validation() {
        let frame = VideoFrame {
            width: 2,
            height: 2,
            data: vec![0; 12],
            timestamp: 0,
        };
        assert!(frame.validate().is_ok());

        let short = VideoFrame {
            data: vec![0; 6],
            ..frame
        };
        assert_eq!(
            short.validate(),
            Err(MediaError::InvalidFrameData {
                expected: 12,
                actual: 6
            })
        );
    }
}

//! Still image capture
//!
//! Rasterizes the current frame of a live stream at its intrinsic size (or a
//! fallback when the feed reports `0x0`) and encodes it as JPEG unless
//! another [`FrameEncoder`] is supplied. The stream is left running; closing
//! it is the caller's decision.

use crate::device::DeviceStreamHandle;
use crate::error::{MediaError, MediaResult};
use crate::media::{CapturedMedia, MediaKind};
use crate::tracks::{TrackKind, VideoFrame, VideoResolution};
use bytes::Bytes;
use tracing::{debug, info};

/// Still capture settings
#[derive(Debug, Clone)]
pub struct StillCaptureConfig {
    /// Canvas size used when the feed reports zero dimensions
    pub fallback_resolution: VideoResolution,
}

impl Default for StillCaptureConfig {
    fn default() -> Self {
        Self {
            fallback_resolution: VideoResolution::QVGA,
        }
    }
}

impl StillCaptureConfig {
    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.fallback_resolution.is_empty() {
            return Err(MediaError::InvalidConfiguration {
                message: "fallback resolution must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Encodes a raw frame into an image format
pub trait FrameEncoder: Send + Sync {
    /// MIME type of the output
    fn mime_type(&self) -> &str;

    /// Encode `frame`
    fn encode(&self, frame: &VideoFrame) -> MediaResult<Bytes>;
}

/// Quality used by [`JpegFrameEncoder::default`]
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Lossy JPEG encoder
#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    /// Encoder at `quality`, clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Configured quality
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn mime_type(&self) -> &str {
        "image/jpeg"
    }

    fn encode(&self, frame: &VideoFrame) -> MediaResult<Bytes> {
        frame.validate()?;

        let encoding_error = |reason: String| MediaError::EncodingFailed {
            format: "jpeg".to_string(),
            reason,
        };
        let width = u16::try_from(frame.width)
            .map_err(|_| encoding_error(format!("width {} exceeds 65535", frame.width)))?;
        let height = u16::try_from(frame.height)
            .map_err(|_| encoding_error(format!("height {} exceeds 65535", frame.height)))?;

        let mut buffer = Vec::new();
        jpeg_encoder::Encoder::new(&mut buffer, self.quality)
            .encode(&frame.data, width, height, jpeg_encoder::ColorType::Rgb)
            .map_err(|e| encoding_error(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }
}

/// Lossless PNG encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct PngFrameEncoder;

impl FrameEncoder for PngFrameEncoder {
    fn mime_type(&self) -> &str {
        "image/png"
    }

    fn encode(&self, frame: &VideoFrame) -> MediaResult<Bytes> {
        frame.validate()?;

        let encoding_error = |e: png::EncodingError| MediaError::EncodingFailed {
            format: "png".to_string(),
            reason: e.to_string(),
        };

        let mut buffer = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buffer, frame.width, frame.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().map_err(encoding_error)?;
            writer.write_image_data(&frame.data).map_err(encoding_error)?;
            writer.finish().map_err(encoding_error)?;
        }
        Ok(Bytes::from(buffer))
    }
}

/// Takes stills from a live stream
pub struct StillCapture {
    config: StillCaptureConfig,
    encoder: Box<dyn FrameEncoder>,
}

impl StillCapture {
    /// JPEG still capture
    pub fn new(config: StillCaptureConfig) -> Self {
        Self::with_encoder(config, Box::new(JpegFrameEncoder::default()))
    }

    /// Still capture with a custom encoder
    pub fn with_encoder(config: StillCaptureConfig, encoder: Box<dyn FrameEncoder>) -> Self {
        Self { config, encoder }
    }

    /// Current configuration
    pub fn config(&self) -> &StillCaptureConfig {
        &self.config
    }

    /// Capture one frame from `handle`
    ///
    /// Fails with `NotReady` until frame metadata has loaded. Never closes
    /// the handle.
    pub fn capture(&self, handle: &DeviceStreamHandle) -> MediaResult<CapturedMedia> {
        if !handle.has_track(TrackKind::Video) {
            return Err(MediaError::MissingTrack {
                kind: TrackKind::Video.to_string(),
            });
        }
        let source = handle.source()?;
        let geometry = source.video_geometry().ok_or_else(|| MediaError::NotReady {
            reason: "video metadata not loaded".to_string(),
        })?;

        let resolution = if geometry.is_empty() {
            debug!(
                "Feed reported {}, using fallback {}",
                geometry, self.config.fallback_resolution
            );
            self.config.fallback_resolution
        } else {
            geometry
        };

        let frame = source.rasterize(resolution)?;
        let data = self.encoder.encode(&frame)?;
        let media = CapturedMedia::new(MediaKind::Image, data, self.encoder.mime_type())?;

        info!(
            "Captured {} still ({} bytes) from stream {}",
            resolution,
            media.size_bytes(),
            handle.id()
        );
        Ok(media)
    }
}

impl Default for StillCapture {
    fn default() -> Self {
        Self::new(StillCaptureConfig::default())
    }
}

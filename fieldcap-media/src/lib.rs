//! # Field Capture Media
//!
//! Camera and microphone access for field capture. This crate opens device
//! streams, takes still images, and records bounded audio/video clips, with
//! every platform interaction routed through the [`CaptureBackend`] seam.

#![warn(clippy::all)]

pub mod capture;
pub mod device;
pub mod error;
pub mod media;
pub mod recorder;
pub mod still;
pub mod tracks;

// Re-export main types
pub use capture::{
    CaptureBackend, FragmentRecorder, StreamConstraints, StreamSource, SyntheticBackend,
    SyntheticConfig,
};
pub use device::{DeviceStreamHandle, MediaDeviceSession};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use media::{CapturedMedia, MediaKind};
pub use recorder::{
    BoundedRecorder, RecorderConfig, RecorderEvent, RecorderState, RecordingOutcome, StopReason,
    DEFAULT_RECORDING_CEILING, DEFAULT_WARNING_SECS,
};
pub use still::{
    FrameEncoder, JpegFrameEncoder, PngFrameEncoder, StillCapture, StillCaptureConfig,
    DEFAULT_JPEG_QUALITY,
};
pub use tracks::{TrackInfo, TrackKind, VideoFrame, VideoResolution};

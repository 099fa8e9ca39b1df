//! # Field Capture Core
//!
//! Foundational types for field inspection capture: the user-facing error
//! taxonomy, accounting for scarce resources (camera handles, preview URLs,
//! timers), and geographic types shared by the location and upload paths.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod geo;
pub mod preview;
pub mod resource;
pub mod task;

// Re-export main types
pub use error::{FieldCapError, FieldCapResult};
pub use geo::{Coordinates, LocationSample};
pub use preview::{PreviewBlob, PreviewRegistry, PreviewSlot, PreviewUrl};
pub use resource::{
    ResourceCount, ResourceKind, ResourceLease, ResourceLedger, ResourceLimits, ResourceUsage,
};
pub use task::ScopedTask;

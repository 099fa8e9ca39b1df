//! Live map viewport
//!
//! [`LiveMapView`] keeps the marker on the latest displayed sample and
//! decides whether new samples move the viewport. The first sample always
//! centers the map. After that, [`FollowPolicy`] governs auto-centering,
//! while [`LiveMapView::recenter`] jumps to the marker once without changing
//! the follow mode.

use crate::error::{LocationError, LocationResult};
use fieldcap_core::{Coordinates, LocationSample};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Lowest supported zoom level
pub const MIN_ZOOM: u8 = 1;
/// Highest supported zoom level
pub const MAX_ZOOM: u8 = 19;

/// When new samples move the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowPolicy {
    /// Always center on new samples, even after the user pans
    Always,
    /// Center on new samples until the user pans away
    #[default]
    UntilUserPans,
    /// Only the first sample centers the map
    Never,
}

/// Map settings
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Zoom level
    pub zoom: u8,
    /// Auto-centering policy
    pub follow_policy: FollowPolicy,
    /// Center shown before any sample arrives
    pub initial_center: Coordinates,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: 15,
            follow_policy: FollowPolicy::default(),
            initial_center: Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            },
        }
    }
}

impl MapConfig {
    /// Validate configuration
    pub fn validate(&self) -> LocationResult<()> {
        validate_zoom(self.zoom)?;
        self.initial_center.validate()?;
        Ok(())
    }
}

fn validate_zoom(zoom: u8) -> LocationResult<()> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(LocationError::InvalidConfiguration {
            message: format!("zoom {} outside {}..={}", zoom, MIN_ZOOM, MAX_ZOOM),
        });
    }
    Ok(())
}

/// Visible map region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapViewport {
    /// Center of the view
    pub center: Coordinates,
    /// Zoom level
    pub zoom: u8,
    /// Whether new samples re-center the view
    pub follow_mode: bool,
}

/// Draws the viewport; tile rendering lives outside this crate
pub trait MapRenderer: Send + Sync {
    /// Draw `viewport` with a marker at `marker`, if any
    fn render(&self, viewport: &MapViewport, marker: Option<&LocationSample>);
}

/// Map showing the latest displayed location
pub struct LiveMapView {
    config: MapConfig,
    viewport: MapViewport,
    marker: Option<LocationSample>,
    renderer: Arc<dyn MapRenderer>,
}

impl LiveMapView {
    /// Create a map view and draw its initial state
    pub fn new(config: MapConfig, renderer: Arc<dyn MapRenderer>) -> LocationResult<Self> {
        config.validate()?;
        let viewport = MapViewport {
            center: config.initial_center,
            zoom: config.zoom,
            follow_mode: config.follow_policy != FollowPolicy::Never,
        };
        let view = Self {
            config,
            viewport,
            marker: None,
            renderer,
        };
        view.redraw();
        Ok(view)
    }

    /// Current viewport
    pub fn viewport(&self) -> MapViewport {
        self.viewport
    }

    /// Latest displayed sample
    pub fn marker(&self) -> Option<&LocationSample> {
        self.marker.as_ref()
    }

    /// Whether new samples re-center the view
    pub fn follow_mode(&self) -> bool {
        self.viewport.follow_mode
    }

    /// Auto-centering policy
    pub fn follow_policy(&self) -> FollowPolicy {
        self.config.follow_policy
    }

    /// Move the marker to `sample`; returns whether the view re-centered
    pub fn show_sample(&mut self, sample: LocationSample) -> bool {
        let first = self.marker.is_none();
        self.marker = Some(sample);

        let centered = first || self.viewport.follow_mode;
        if centered {
            self.viewport.center = sample.coordinates();
        }
        debug!(
            "Map marker at ({}, {}), centered: {}",
            sample.latitude, sample.longitude, centered
        );
        self.redraw();
        centered
    }

    /// User panned the map
    pub fn pan_to(&mut self, center: Coordinates) -> LocationResult<()> {
        center.validate()?;
        self.viewport.center = center;
        if self.config.follow_policy == FollowPolicy::UntilUserPans {
            self.viewport.follow_mode = false;
        }
        self.redraw();
        Ok(())
    }

    /// Change zoom level
    pub fn set_zoom(&mut self, zoom: u8) -> LocationResult<()> {
        validate_zoom(zoom)?;
        self.viewport.zoom = zoom;
        self.redraw();
        Ok(())
    }

    /// Jump to the marker once; follow mode is left as it is
    ///
    /// Returns `false` when no sample has been displayed yet.
    pub fn recenter(&mut self) -> bool {
        let Some(marker) = self.marker else {
            return false;
        };
        self.viewport.center = marker.coordinates();
        self.redraw();
        true
    }

    /// Turn auto-centering back on, unless the policy forbids it
    pub fn resume_follow(&mut self) {
        self.viewport.follow_mode = self.config.follow_policy != FollowPolicy::Never;
    }

    fn redraw(&self) {
        self.renderer.render(&self.viewport, self.marker.as_ref());
    }
}

impl std::fmt::Debug for LiveMapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMapView")
            .field("viewport", &self.viewport)
            .field("marker", &self.marker)
            .finish()
    }
}

//! In-process location capabilities
//!
//! A sink that stores the last pushed sample, a geolocator that replays a
//! script, and a renderer that records every frame. The demo runs on these
//! and so do the tests.

use crate::capability::{Geolocator, LocationSink};
use crate::error::{LocationError, LocationResult};
use crate::map::{MapRenderer, MapViewport};
use async_trait::async_trait;
use chrono::Utc;
use fieldcap_core::LocationSample;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// A call observed by [`InMemoryLocationSink`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkCall {
    /// `push(latitude, longitude)`
    Push {
        /// Pushed latitude
        latitude: f64,
        /// Pushed longitude
        longitude: f64,
    },
    /// `fetch_latest()`
    Fetch,
}

#[derive(Debug, Default)]
struct SinkState {
    stored: Option<LocationSample>,
    calls: Vec<SinkCall>,
    fail_push: bool,
    fail_fetch: bool,
}

/// Location sink that keeps the last pushed sample in memory
#[derive(Debug, Default)]
pub struct InMemoryLocationSink {
    state: Mutex<SinkState>,
}

impl InMemoryLocationSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that already holds `sample`
    pub fn with_stored(sample: LocationSample) -> Self {
        let sink = Self::new();
        sink.state.lock().stored = Some(sample);
        sink
    }

    /// Make subsequent pushes fail
    pub fn set_fail_push(&self, fail: bool) {
        self.state.lock().fail_push = fail;
    }

    /// Make subsequent fetches fail
    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().fail_fetch = fail;
    }

    /// Calls received, in order
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.clone()
    }

    /// Stored sample
    pub fn stored(&self) -> Option<LocationSample> {
        self.state.lock().stored
    }
}

#[async_trait]
impl LocationSink for InMemoryLocationSink {
    async fn push(&self, latitude: f64, longitude: f64) -> LocationResult<()> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Push {
            latitude,
            longitude,
        });
        if state.fail_push {
            return Err(LocationError::Push {
                reason: "sink rejected the sample".to_string(),
            });
        }
        // the store stamps the sample itself
        state.stored = Some(LocationSample {
            latitude,
            longitude,
            captured_at: Utc::now(),
        });
        Ok(())
    }

    async fn fetch_latest(&self) -> LocationResult<LocationSample> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Fetch);
        if state.fail_fetch {
            return Err(LocationError::Fetch {
                reason: "sink unreachable".to_string(),
            });
        }
        state.stored.ok_or(LocationError::NoStoredLocation)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScriptStep {
    Position(f64, f64),
    Denied,
    Hang,
}

/// Geolocator that replays scripted answers
///
/// Once the script is exhausted the last position step repeats; with no
/// position in the script, requests fail.
#[derive(Debug, Default)]
pub struct ScriptedGeolocator {
    script: Mutex<VecDeque<ScriptStep>>,
    last_position: Mutex<Option<(f64, f64)>>,
    requests: AtomicU64,
}

impl ScriptedGeolocator {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request with a position
    pub fn then_position(self, latitude: f64, longitude: f64) -> Self {
        self.script
            .lock()
            .push_back(ScriptStep::Position(latitude, longitude));
        self
    }

    /// Answer the next request with a permission denial
    pub fn then_denied(self) -> Self {
        self.script.lock().push_back(ScriptStep::Denied);
        self
    }

    /// Never answer the next request
    pub fn then_hang(self) -> Self {
        self.script.lock().push_back(ScriptStep::Hang);
        self
    }

    /// Requests served
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geolocator for ScriptedGeolocator {
    async fn current_position(&self) -> LocationResult<LocationSample> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        let step = match step {
            Some(step) => step,
            None => match *self.last_position.lock() {
                Some((latitude, longitude)) => ScriptStep::Position(latitude, longitude),
                None => ScriptStep::Denied,
            },
        };
        trace!("Scripted geolocator answering {:?}", step);

        match step {
            ScriptStep::Position(latitude, longitude) => {
                *self.last_position.lock() = Some((latitude, longitude));
                Ok(LocationSample::now(latitude, longitude))
            }
            ScriptStep::Denied => Err(LocationError::PositionUnavailable {
                reason: "permission denied".to_string(),
            }),
            ScriptStep::Hang => std::future::pending::<LocationResult<LocationSample>>().await,
        }
    }
}

/// Renderer that records every frame
#[derive(Debug, Default)]
pub struct RecordingMapRenderer {
    frames: Mutex<Vec<(MapViewport, Option<LocationSample>)>>,
}

impl RecordingMapRenderer {
    /// Empty renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames drawn so far
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Most recent frame
    pub fn last_frame(&self) -> Option<(MapViewport, Option<LocationSample>)> {
        self.frames.lock().last().copied()
    }
}

impl MapRenderer for RecordingMapRenderer {
    fn render(&self, viewport: &MapViewport, marker: Option<&LocationSample>) {
        self.frames.lock().push((*viewport, marker.copied()));
    }
}

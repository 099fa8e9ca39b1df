//! Live location screen
//!
//! Runs the location publisher for as long as the screen is mounted and
//! feeds every displayed sample into the map view.

use crate::config::FieldCapConfig;
use crate::event::{Event, EventBus, EventStream};
use fieldcap_core::{
    Coordinates, FieldCapError, FieldCapResult, LocationSample, ResourceLedger, ScopedTask,
};
use fieldcap_location::{
    CycleReport, Geolocator, LiveMapView, LocationPublisher, LocationSink, MapConfig, MapRenderer,
    MapViewport, PublisherEvent,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Collaborators the location screen talks to
#[derive(Clone)]
pub struct LocationServices {
    /// Device position source
    pub geolocator: Arc<dyn Geolocator>,
    /// Store of record for locations
    pub sink: Arc<dyn LocationSink>,
    /// Map drawing surface
    pub renderer: Arc<dyn MapRenderer>,
}

/// What the screen currently shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationStatus {
    /// Latest position read back from the sink
    pub latest: Option<LocationSample>,
    /// Failure message of the most recent cycle, if it failed
    pub error: Option<String>,
    /// Cycles completed
    pub cycles: u64,
}

impl LocationStatus {
    fn apply(&mut self, report: &CycleReport) {
        self.cycles = report.cycle;
        self.error = report.error_message();
        if let Some(sample) = report.displayed() {
            self.latest = Some(*sample);
        }
    }
}

/// Controller behind the live location page
pub struct LocationScreen {
    publisher: LocationPublisher,
    map: Arc<Mutex<LiveMapView>>,
    status: Arc<Mutex<LocationStatus>>,
    events: EventBus,
    pump: Option<ScopedTask>,
}

impl LocationScreen {
    /// Mount the screen: draw the map and run the first cycle immediately
    pub fn open(
        config: &FieldCapConfig,
        services: LocationServices,
        ledger: ResourceLedger,
    ) -> FieldCapResult<Self> {
        tokio::runtime::Handle::try_current().map_err(|e| FieldCapError::Initialization {
            reason: format!("location screen needs a tokio runtime: {}", e),
        })?;
        config.validate()?;

        let map = LiveMapView::new(
            config.map_config(MapConfig::default().initial_center),
            services.renderer,
        )?;
        let publisher = LocationPublisher::new(
            config.publisher_config(),
            services.geolocator,
            services.sink,
        )?
        .with_ledger(ledger);

        let map = Arc::new(Mutex::new(map));
        let status = Arc::new(Mutex::new(LocationStatus::default()));
        let events = EventBus::default();

        let pump = ScopedTask::spawn(
            "location-screen-pump",
            pump_cycles(publisher.subscribe(), map.clone(), status.clone(), events.clone()),
        );
        publisher.start()?;
        info!("Location screen mounted");

        Ok(Self {
            publisher,
            map,
            status,
            events,
            pump: Some(pump),
        })
    }

    /// Subscribe to screen events
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Latest position, error and cycle count
    pub fn status(&self) -> LocationStatus {
        self.status.lock().clone()
    }

    /// Current map viewport
    pub fn viewport(&self) -> MapViewport {
        self.map.lock().viewport()
    }

    /// Whether new samples re-center the map
    pub fn follow_mode(&self) -> bool {
        self.map.lock().follow_mode()
    }

    /// Jump to the latest position once
    pub fn recenter(&self) -> bool {
        self.map.lock().recenter()
    }

    /// User dragged the map
    pub fn pan_to(&self, center: Coordinates) -> FieldCapResult<()> {
        Ok(self.map.lock().pan_to(center)?)
    }

    /// Change map zoom
    pub fn set_zoom(&self, zoom: u8) -> FieldCapResult<()> {
        Ok(self.map.lock().set_zoom(zoom)?)
    }

    /// Turn auto-centering back on
    pub fn resume_follow(&self) {
        self.map.lock().resume_follow();
    }

    /// Whether the schedule is still running
    pub fn is_running(&self) -> bool {
        self.publisher.is_running()
    }

    /// Unmount: stop the schedule and ignore any cycle still in flight
    pub fn shutdown(&mut self) -> bool {
        let Some(pump) = self.pump.take() else {
            return false;
        };
        pump.abort();
        self.publisher.stop();
        info!("Location screen unmounted");
        true
    }
}

async fn pump_cycles(
    mut reports: tokio::sync::broadcast::Receiver<PublisherEvent>,
    map: Arc<Mutex<LiveMapView>>,
    status: Arc<Mutex<LocationStatus>>,
    events: EventBus,
) {
    loop {
        let report = match reports.recv().await {
            Ok(PublisherEvent::Cycle(report)) => report,
            Ok(PublisherEvent::Stopped { cycles }) => {
                debug!("Publisher stopped after {} cycles", cycles);
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Location screen skipped {} cycles", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        status.lock().apply(&report);
        if let Some(sample) = report.displayed() {
            map.lock().show_sample(*sample);
            events.publish(Event::LocationUpdated {
                cycle: report.cycle,
                sample: *sample,
            });
        }
        if let Some(error) = report.error_message() {
            events.publish(Event::LocationFailed {
                cycle: report.cycle,
                error,
            });
        }
    }
}

impl Drop for LocationScreen {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LocationScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationScreen")
            .field("running", &self.is_running())
            .field("status", &self.status())
            .field("viewport", &self.viewport())
            .finish()
    }
}

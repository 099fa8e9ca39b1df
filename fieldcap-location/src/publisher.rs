//! Periodic location publishing
//!
//! Every cycle samples the device position, pushes it to the sink when the
//! sample succeeded, and then re-reads the sink's stored value for display.
//! Push and re-read run one after the other, so a successful push is always
//! reflected in the same cycle's display. Failures are reported per cycle;
//! the schedule keeps running and simply tries again next time.

use crate::capability::{Geolocator, LocationSink};
use crate::error::{LocationError, LocationResult};
use fieldcap_core::{LocationSample, ResourceLedger, ScopedTask};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default publishing interval
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);

/// Publisher settings
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Time between cycles; the first cycle runs immediately
    pub interval: Duration,
    /// How long to wait for a position fix
    pub position_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PUBLISH_INTERVAL,
            position_timeout: Duration::from_secs(10),
        }
    }
}

impl PublisherConfig {
    /// Validate configuration
    pub fn validate(&self) -> LocationResult<()> {
        if self.interval.is_zero() {
            return Err(LocationError::InvalidConfiguration {
                message: "publish interval must be non-zero".to_string(),
            });
        }
        if self.position_timeout.is_zero() {
            return Err(LocationError::InvalidConfiguration {
                message: "position timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// The device sample
    pub sampled: LocationResult<LocationSample>,
    /// Push outcome; `None` when skipped because sampling failed
    pub push: Option<LocationResult<()>>,
    /// The sink's stored value
    pub fetched: LocationResult<LocationSample>,
}

impl CycleReport {
    /// Sample to display, taken from the sink
    pub fn displayed(&self) -> Option<&LocationSample> {
        self.fetched.as_ref().ok()
    }

    /// First failure of the cycle, in sample, push, fetch order
    pub fn error(&self) -> Option<&LocationError> {
        if let Err(e) = &self.sampled {
            return Some(e);
        }
        if let Some(Err(e)) = &self.push {
            return Some(e);
        }
        self.fetched.as_ref().err()
    }

    /// User-facing message for the cycle's failure
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Every step succeeded
    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }
}

/// Publisher events
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherEvent {
    /// A cycle finished
    Cycle(CycleReport),
    /// The schedule was stopped
    Stopped {
        /// Cycles completed
        cycles: u64,
    },
}

#[derive(Clone)]
struct CycleRunner {
    geolocator: Arc<dyn Geolocator>,
    sink: Arc<dyn LocationSink>,
    position_timeout: Duration,
    cycles: Arc<AtomicU64>,
}

impl CycleRunner {
    async fn run(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Location cycle {} started", cycle);

        let sampled = self.sample().await;
        let push = match &sampled {
            Ok(sample) => Some(self.sink.push(sample.latitude, sample.longitude).await),
            Err(_) => None,
        };
        let fetched = self.sink.fetch_latest().await;

        let report = CycleReport {
            cycle,
            sampled,
            push,
            fetched,
        };
        match report.error() {
            None => info!("Location cycle {} published", cycle),
            Some(e) => warn!("Location cycle {} failed: {}", cycle, e),
        }
        report
    }

    async fn sample(&self) -> LocationResult<LocationSample> {
        let sample = tokio::time::timeout(self.position_timeout, self.geolocator.current_position())
            .await
            .map_err(|_| LocationError::Timeout {
                after: self.position_timeout,
            })??;
        sample.coordinates().validate()?;
        Ok(sample)
    }
}

/// Runs location cycles on a fixed schedule
pub struct LocationPublisher {
    config: PublisherConfig,
    runner: CycleRunner,
    events: broadcast::Sender<PublisherEvent>,
    running: Mutex<Option<RunningSchedule>>,
    ledger: Option<ResourceLedger>,
}

struct RunningSchedule {
    shutdown: watch::Sender<bool>,
    task: ScopedTask,
}

impl LocationPublisher {
    /// Create a publisher
    pub fn new(
        config: PublisherConfig,
        geolocator: Arc<dyn Geolocator>,
        sink: Arc<dyn LocationSink>,
    ) -> LocationResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            runner: CycleRunner {
                geolocator,
                sink,
                position_timeout: config.position_timeout,
                cycles: Arc::new(AtomicU64::new(0)),
            },
            config,
            events,
            running: Mutex::new(None),
            ledger: None,
        })
    }

    /// Account the schedule timer in `ledger`
    pub fn with_ledger(mut self, ledger: ResourceLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Publisher configuration
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Cycles started so far
    pub fn cycles(&self) -> u64 {
        self.runner.cycles.load(Ordering::SeqCst)
    }

    /// Whether the schedule is running
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Subscribe to publisher events
    pub fn subscribe(&self) -> broadcast::Receiver<PublisherEvent> {
        self.events.subscribe()
    }

    /// Run one cycle now, outside the schedule
    pub async fn run_cycle(&self) -> CycleReport {
        self.runner.run().await
    }

    /// Start the schedule: one cycle immediately, then every interval
    pub fn start(&self) -> LocationResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(LocationError::AlreadyRunning);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = self.runner.clone();
        let events = self.events.clone();
        let interval = self.config.interval;

        let schedule = async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                let report = runner.run().await;
                if *shutdown_rx.borrow() {
                    debug!("Discarding cycle {} after teardown", report.cycle);
                    break;
                }
                let _ = events.send(PublisherEvent::Cycle(report));
            }
        };

        let task = match &self.ledger {
            Some(ledger) => ScopedTask::spawn_timer("location-publisher", ledger, schedule)
                .map_err(|e| LocationError::InvalidConfiguration {
                    message: e.to_string(),
                })?,
            None => ScopedTask::spawn("location-publisher", schedule),
        };

        *running = Some(RunningSchedule { shutdown, task });
        info!("Location publisher started, every {:?}", interval);
        Ok(())
    }

    /// Stop the schedule
    ///
    /// A cycle already in flight runs to completion, but its result is
    /// discarded. Returns `false` if the schedule was not running.
    pub fn stop(&self) -> bool {
        let Some(schedule) = self.running.lock().take() else {
            return false;
        };
        let _ = schedule.shutdown.send(true);
        schedule.task.detach();

        let cycles = self.cycles();
        info!("Location publisher stopped after {} cycles", cycles);
        let _ = self.events.send(PublisherEvent::Stopped { cycles });
        true
    }
}

impl Drop for LocationPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryLocationSink, ScriptedGeolocator, SinkCall};

    #[test]
    fn test_config_validation() {
        assert!(PublisherConfig::default().validate().is_ok());
        let config = PublisherConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_failed_sample_skips_push_but_fetches() {
        let sink = Arc::new(InMemoryLocationSink::with_stored(LocationSample::now(1.0, 2.0)));
        let geolocator = Arc::new(ScriptedGeolocator::new().then_denied());
        let publisher =
            LocationPublisher::new(PublisherConfig::default(), geolocator, sink.clone()).unwrap();

        let report = publisher.run_cycle().await;
        assert!(matches!(
            report.sampled,
            Err(LocationError::PositionUnavailable { .. })
        ));
        assert_eq!(report.push, None);
        assert_eq!(report.displayed().map(|s| s.latitude), Some(1.0));
        assert_eq!(sink.calls(), vec![SinkCall::Fetch]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_timeout() {
        let sink = Arc::new(InMemoryLocationSink::new());
        let geolocator = Arc::new(ScriptedGeolocator::new().then_hang());
        let publisher =
            LocationPublisher::new(PublisherConfig::default(), geolocator, sink).unwrap();

        let report = publisher.run_cycle().await;
        assert_eq!(
            report.sampled,
            Err(LocationError::Timeout {
                after: Duration::from_secs(10)
            })
        );
    }

    #[test]
    fn test_report_error_order() {
        let report = CycleReport {
            cycle: 1,
            sampled: Ok(LocationSample::now(1.0, 1.0)),
            push: Some(Err(LocationError::Push {
                reason: "503".to_string(),
            })),
            fetched: Err(LocationError::NoStoredLocation),
        };
        assert_eq!(
            report.error_message().as_deref(),
            Some("Location push failed: 503")
        );
        assert!(!report.is_success());
    }
}

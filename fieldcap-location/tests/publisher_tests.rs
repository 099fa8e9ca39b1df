//! Integration tests for the location publishing schedule
//!
//! Time is paused so the 60 second interval is driven deterministically.

use fieldcap_core::{FieldCapError, LocationSample, ResourceKind, ResourceLedger};
use fieldcap_location::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

async fn next_report(events: &mut broadcast::Receiver<PublisherEvent>) -> CycleReport {
    loop {
        match events.recv().await {
            Ok(PublisherEvent::Cycle(report)) => return report,
            Ok(_) => continue,
            Err(e) => panic!("publisher events closed: {}", e),
        }
    }
}

// ============================================================================
// SCHEDULE TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_immediately_then_every_interval() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    let publisher =
        LocationPublisher::new(PublisherConfig::default(), geolocator.clone(), sink).unwrap();
    let mut events = publisher.subscribe();

    publisher.start().unwrap();
    let first = next_report(&mut events).await;
    assert_eq!(first.cycle, 1);
    assert!(first.is_success());

    sleep(Duration::from_secs(59)).await;
    assert_eq!(publisher.cycles(), 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(publisher.cycles(), 2);

    sleep(Duration::from_secs(180)).await;
    assert_eq!(publisher.cycles(), 5);
    assert_eq!(geolocator.requests(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_push_precedes_fetch_in_every_cycle() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    let publisher = LocationPublisher::new(
        PublisherConfig::default(),
        geolocator,
        sink.clone(),
    )
    .unwrap();

    publisher.start().unwrap();
    sleep(Duration::from_secs(60 * 4 + 30)).await;
    publisher.stop();

    let calls = sink.calls();
    assert_eq!(calls.len(), 10);
    for pair in calls.chunks(2) {
        assert!(matches!(pair[0], SinkCall::Push { .. }));
        assert_eq!(pair[1], SinkCall::Fetch);
    }
}

#[tokio::test(start_paused = true)]
async fn test_displayed_value_comes_from_sink() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    let publisher =
        LocationPublisher::new(PublisherConfig::default(), geolocator, sink.clone()).unwrap();

    let report = publisher.run_cycle().await;
    let displayed = report.displayed().copied().unwrap();
    assert_eq!(Some(displayed), sink.stored());
    assert_eq!((displayed.latitude, displayed.longitude), (18.52, 73.85));
}

// ============================================================================
// FAILURE AND RETRY TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_denied_then_retried_on_next_cycle() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(
        ScriptedGeolocator::new()
            .then_denied()
            .then_position(18.52, 73.85),
    );
    let publisher =
        LocationPublisher::new(PublisherConfig::default(), geolocator, sink.clone()).unwrap();
    let mut events = publisher.subscribe();

    publisher.start().unwrap();

    let first = next_report(&mut events).await;
    assert_eq!(first.cycle, 1);
    let error: FieldCapError = first.error().cloned().unwrap().into();
    assert_eq!(error.error_code(), "POSITION_UNAVAILABLE");
    assert_eq!(first.push, None);

    let second = next_report(&mut events).await;
    assert_eq!(second.cycle, 2);
    assert!(second.is_success());
    assert_eq!(second.displayed().map(|s| s.latitude), Some(18.52));
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_still_fetches_and_keeps_schedule() {
    let stored = LocationSample::now(1.0, 1.0);
    let sink = Arc::new(InMemoryLocationSink::with_stored(stored));
    sink.set_fail_push(true);
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    let publisher =
        LocationPublisher::new(PublisherConfig::default(), geolocator, sink.clone()).unwrap();
    let mut events = publisher.subscribe();

    publisher.start().unwrap();
    let first = next_report(&mut events).await;
    assert!(matches!(first.push, Some(Err(LocationError::Push { .. }))));
    assert_eq!(first.displayed(), Some(&stored));

    sink.set_fail_push(false);
    let second = next_report(&mut events).await;
    assert!(second.is_success());
    assert_eq!(second.displayed().map(|s| s.latitude), Some(18.52));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_geolocator_times_out_each_cycle() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_hang());
    let config = PublisherConfig {
        position_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let publisher = LocationPublisher::new(config, geolocator, sink).unwrap();
    let mut events = publisher.subscribe();

    publisher.start().unwrap();
    let first = next_report(&mut events).await;
    assert_eq!(
        first.sampled,
        Err(LocationError::Timeout {
            after: Duration::from_secs(5)
        })
    );
    assert_eq!(first.fetched, Err(LocationError::NoStoredLocation));
}

// ============================================================================
// TEARDOWN TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_schedule() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    let ledger = ResourceLedger::default();
    let publisher = LocationPublisher::new(PublisherConfig::default(), geolocator, sink.clone())
        .unwrap()
        .with_ledger(ledger.clone());

    publisher.start().unwrap();
    assert_eq!(ledger.live(ResourceKind::Timer), 1);
    assert!(matches!(publisher.start(), Err(LocationError::AlreadyRunning)));

    sleep(Duration::from_secs(61)).await;
    assert!(publisher.stop());
    assert!(!publisher.stop());
    assert_eq!(ledger.live(ResourceKind::Timer), 0);

    let calls_at_stop = sink.calls().len();
    sleep(Duration::from_secs(600)).await;
    assert_eq!(sink.calls().len(), calls_at_stop);
    assert_eq!(publisher.cycles(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_cycle_completes_but_is_discarded() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_hang());
    let config = PublisherConfig {
        position_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let publisher = LocationPublisher::new(config, geolocator, sink.clone()).unwrap();
    let mut events = publisher.subscribe();

    publisher.start().unwrap();
    // cycle 1 is waiting on the position fix
    sleep(Duration::from_secs(1)).await;
    publisher.stop();

    sleep(Duration::from_secs(10)).await;
    // the cycle ran to completion and read the sink
    assert_eq!(sink.calls(), vec![SinkCall::Fetch]);

    let mut saw_cycle = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, PublisherEvent::Cycle(_)) {
            saw_cycle = true;
        }
    }
    assert!(!saw_cycle);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_schedule() {
    let sink = Arc::new(InMemoryLocationSink::new());
    let geolocator = Arc::new(ScriptedGeolocator::new().then_position(18.52, 73.85));
    {
        let publisher =
            LocationPublisher::new(PublisherConfig::default(), geolocator.clone(), sink.clone())
                .unwrap();
        publisher.start().unwrap();
        sleep(Duration::from_secs(1)).await;
    }
    sleep(Duration::from_secs(300)).await;
    assert_eq!(geolocator.requests(), 1);
}

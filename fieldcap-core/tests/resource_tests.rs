//! Integration tests for resource accounting across previews and timers

use bytes::Bytes;
use fieldcap_core::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn png_bytes() -> Bytes {
    Bytes::from_static(b"\x89PNG\r\n\x1a\n")
}

// ============================================================================
// LEDGER TESTS
// ============================================================================

#[test]
fn test_single_camera_allows_one_device_handle() {
    let ledger = ResourceLedger::new(ResourceLimits::single_camera());

    let first = assert_ok!(ledger.acquire(ResourceKind::DeviceHandle));
    let err = assert_err!(ledger.acquire(ResourceKind::DeviceHandle));
    assert_eq!(err.error_code(), "RESOURCE_LIMIT_EXCEEDED");
    assert!(!err.is_recoverable());

    first.release();
    let _second = assert_ok!(ledger.acquire(ResourceKind::DeviceHandle));

    let count = ledger.count(ResourceKind::DeviceHandle);
    assert_eq!(count.live, 1);
    assert_eq!(count.peak, 1);
    assert_eq!(count.acquired_total, 2);
}

#[test]
fn test_clones_share_counters() {
    let ledger = ResourceLedger::unlimited();
    let other = ledger.clone();

    let leases: Vec<_> = (0..3)
        .map(|_| other.acquire(ResourceKind::Timer).unwrap())
        .collect();
    assert_eq!(ledger.live(ResourceKind::Timer), 3);

    drop(leases);
    let usage = ledger.usage();
    assert!(usage.is_quiescent());
    assert_eq!(usage.timers.peak, 3);
}

// ============================================================================
// PREVIEW TESTS
// ============================================================================

#[test]
fn test_preview_slot_keeps_one_url_live() {
    let ledger = ResourceLedger::new(ResourceLimits::single_camera());
    let registry = PreviewRegistry::new(ledger.clone());
    let mut slot = PreviewSlot::new(registry.clone());

    let first = assert_ok!(slot.replace(png_bytes(), "image/png"));
    let second = assert_ok!(slot.replace(Bytes::from_static(b"webm"), "video/webm"));

    assert!(!registry.is_live(&first));
    assert!(registry.is_live(&second));
    assert_eq!(registry.resolve(&second).map(|b| b.mime_type), Some("video/webm".to_string()));
    assert_eq!(ledger.live(ResourceKind::PreviewUrl), 1);
    assert_eq!(ledger.peak(ResourceKind::PreviewUrl), 1);

    drop(slot);
    assert_eq!(registry.live_count(), 0);
    assert!(ledger.usage().is_quiescent());
}

#[test]
fn test_preview_limit_surfaces_as_error() {
    let ledger = ResourceLedger::new(ResourceLimits {
        max_preview_urls: Some(1),
        ..ResourceLimits::unlimited()
    });
    let registry = PreviewRegistry::new(ledger);

    let url = assert_ok!(registry.create(png_bytes(), "image/png"));
    assert_err!(registry.create(png_bytes(), "image/png"));

    assert!(registry.revoke(&url));
    assert!(!registry.revoke(&url));
    assert_ok!(registry.create(png_bytes(), "image/png"));
}

// ============================================================================
// TIMER TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_dropped_timer_stops_ticking_and_frees_its_slot() {
    let ledger = ResourceLedger::new(ResourceLimits::single_camera());
    let ticks = Arc::new(AtomicU32::new(0));

    let counter = ticks.clone();
    let timer = assert_ok!(ScopedTask::spawn_timer("countdown", &ledger, async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));
    assert_eq!(ledger.live(ResourceKind::Timer), 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);

    drop(timer);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.live(ResourceKind::Timer), 0);
}

#[tokio::test]
async fn test_joined_task_runs_to_completion() {
    let done = Arc::new(AtomicU32::new(0));
    let flag = done.clone();
    let task = ScopedTask::spawn("one-shot", async move {
        flag.store(1, Ordering::SeqCst);
    });
    assert_eq!(task.name(), "one-shot");

    task.join().await;
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

// ============================================================================
// GEO TESTS
// ============================================================================

#[test]
fn test_coordinates_reject_out_of_range_values() {
    let err = assert_err!(Coordinates::new(91.0, 0.0));
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
    assert_err!(Coordinates::new(0.0, -180.5));
    assert_err!(Coordinates::new(f64::NAN, 0.0));

    let ok = assert_ok!(Coordinates::new(18.5204, 73.8567));
    assert_eq!(LocationSample::now(18.5204, 73.8567).coordinates(), ok);
}

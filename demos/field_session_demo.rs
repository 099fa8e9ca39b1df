//! Field Session Demo
//!
//! Walks through one inspection visit against in-process stand-ins: a
//! photo upload, a recording stopped by its ceiling, and a few cycles of
//! live location. Timings are shortened so the run takes a few seconds.
//!
//! Run with `cargo run -p fieldcap --example field_session_demo`.

use anyhow::Context;
use fieldcap::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FieldCapConfig {
        recording_ceiling_secs: 4,
        location_interval_secs: 1,
        debug_logging: true,
        ..FieldCapConfig::from_env().context("reading FIELDCAP_* configuration")?
    };
    init_logging(&config)?;

    println!("🍽️  Field Capture Session Demo");
    println!("==============================");

    let field_cap = FieldCap::init_with(config)?;

    demo_photo_upload(&field_cap).await?;
    demo_bounded_recording(&field_cap).await?;
    demo_live_location(&field_cap).await?;

    let usage = field_cap.resource_usage();
    println!("\n📊 Peak usage: {} camera handle(s), {} preview URL(s), {} timer(s)",
        usage.device_handles.peak, usage.preview_urls.peak, usage.timers.peak);
    anyhow::ensure!(usage.is_quiescent(), "resources still held: {:?}", usage);

    println!("\n✨ Field session demo completed!");
    Ok(())
}

fn hotels() -> Arc<StaticHotelDirectory> {
    Arc::new(StaticHotelDirectory::new(vec![
        HotelSummary {
            id: 1,
            name: "Hotel Shivneri".to_string(),
            city: Some("Pune".to_string()),
            address: None,
            is_active: true,
        },
        HotelSummary {
            id: 2,
            name: "Annapurna Mess".to_string(),
            city: Some("Nashik".to_string()),
            address: None,
            is_active: false,
        },
    ]))
}

async fn demo_photo_upload(field_cap: &FieldCap) -> anyhow::Result<()> {
    println!("\n📷 Demo 1: Photo upload");
    println!("-----------------------");

    let uploader = Arc::new(RecordingUploader::new());
    let mut screen = field_cap.submission_screen(SubmissionServices {
        capture: Arc::new(SyntheticBackend::new()),
        uploader: uploader.clone(),
        hotels: hotels(),
        geolocator: Some(Arc::new(ScriptedGeolocator::new().then_position(18.5204, 73.8567))),
    })?;

    for hotel in screen.load_hotels().await? {
        println!("  🏨 {} (#{}){}", hotel.name, hotel.id,
            if hotel.is_active { "" } else { " - inactive" });
    }

    if let Err(e) = screen.select_target(2) {
        println!("  ⚠️  {}", e);
    }
    screen.select_target(1)?;
    screen.set_description("Cold storage at 4C, labels dated");
    let coordinates = screen.capture_location().await?;
    println!("  📍 Tagged at ({:.4}, {:.4})", coordinates.latitude, coordinates.longitude);

    screen.open_camera().await?;
    let photo = screen.capture_image()?;
    println!("  🖼️  Captured {} ({} bytes)", photo.file_name(), photo.size_bytes());
    println!("  🔌 Camera open after capture: {}", screen.is_camera_open());

    let receipt = screen.upload().await?;
    println!("  ✅ {}", receipt.message);
    println!("  📦 Uploads recorded: {}", uploader.upload_count());
    Ok(())
}

async fn demo_bounded_recording(field_cap: &FieldCap) -> anyhow::Result<()> {
    println!("\n🎥 Demo 2: Recording stopped by its ceiling");
    println!("--------------------------------------------");

    let backend = Arc::new(SyntheticBackend::new());
    let uploader = Arc::new(RecordingUploader::new());
    let mut screen = field_cap.submission_screen(SubmissionServices {
        capture: backend.clone(),
        uploader: uploader.clone(),
        hotels: hotels(),
        geolocator: None,
    })?;
    let mut events = FilteredEventStream::new(screen.events(), EventFilter::recording_only());

    screen.load_hotels().await?;
    screen.select_target(1)?;
    screen.open_camera().await?;
    screen.start_recording().await?;
    println!("  ⏺️  Recording, {}s left", screen.remaining_secs().unwrap_or(0));

    let clip = screen.wait_for_recording().await?;
    println!("  🎞️  Recorded {} ({} bytes)", clip.file_name(), clip.size_bytes());
    println!("  🔌 Live camera streams: {}", backend.live_streams());
    tokio::task::yield_now().await;

    while let Some(event) = events.try_next() {
        match event {
            Event::RecordingWarning { remaining_secs } => {
                println!("  ⏳ Warning: {}s left", remaining_secs)
            }
            Event::RecordingFinished { reason, size_bytes, .. } => {
                println!("  ⏹️  Finished ({:?}, {} bytes)", reason, size_bytes)
            }
            _ => {}
        }
    }

    screen.upload().await?;
    println!("  ✅ Uploaded {} item(s)", uploader.upload_count());
    Ok(())
}

async fn demo_live_location(field_cap: &FieldCap) -> anyhow::Result<()> {
    println!("\n🗺️  Demo 3: Live location");
    println!("-------------------------");

    let geolocator = ScriptedGeolocator::new()
        .then_denied()
        .then_position(18.5204, 73.8567)
        .then_position(18.5210, 73.8572);
    let renderer = Arc::new(RecordingMapRenderer::new());
    let mut screen = field_cap.location_screen(LocationServices {
        geolocator: Arc::new(geolocator),
        sink: Arc::new(InMemoryLocationSink::new()),
        renderer: renderer.clone(),
    })?;
    let mut events = screen.events();

    let deadline = tokio::time::Instant::now() + Duration::from_millis(2500);
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.next()).await {
        match event {
            Event::LocationUpdated { cycle, sample } => println!(
                "  📍 Cycle {}: ({:.4}, {:.4}) at {}",
                cycle, sample.latitude, sample.longitude, sample.captured_at
            ),
            Event::LocationFailed { cycle, error } => println!("  ⚠️  Cycle {}: {}", cycle, error),
            _ => {}
        }
    }

    screen.pan_to(Coordinates { latitude: 18.53, longitude: 73.86 })?;
    println!("  🖐️  Panned away, following: {}", screen.follow_mode());
    screen.recenter();
    println!("  🎯 Re-centered on {:?}", screen.viewport().center);

    screen.shutdown();
    println!("  🛑 Publisher running: {}, frames drawn: {}", screen.is_running(), renderer.frame_count());
    Ok(())
}

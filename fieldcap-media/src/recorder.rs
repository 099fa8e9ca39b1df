//! Bounded audio/video recording
//!
//! [`BoundedRecorder`] records a device stream for at most a configured
//! ceiling (28 seconds by default). A one-second countdown runs from start;
//! pausing suspends fragment production but not the countdown. When the
//! countdown reaches zero the recorder stops itself. Whichever path stops a
//! recording, finalization happens exactly once: the fragments are joined in
//! arrival order, the device handle is closed, and the outcome is published.
//! A stream closed by someone else is noticed on the next countdown step and
//! ends the recording as a failure.

use crate::capture::FragmentRecorder;
use crate::device::DeviceStreamHandle;
use crate::error::{MediaError, MediaResult};
use crate::media::{CapturedMedia, MediaKind};
use crate::tracks::TrackKind;
use bytes::{Bytes, BytesMut};
use fieldcap_core::{ResourceLedger, ScopedTask};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default recording ceiling
pub const DEFAULT_RECORDING_CEILING: Duration = Duration::from_secs(28);

/// Remaining seconds at which a warning is raised
pub const DEFAULT_WARNING_SECS: u32 = 3;

/// Recorder settings
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Maximum recording length
    pub ceiling: Duration,
    /// Countdown granularity
    pub tick: Duration,
    /// Container MIME type requested from the encoder
    pub mime_type: String,
    /// Emit a warning once this many seconds remain
    pub warning_secs: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_RECORDING_CEILING,
            tick: Duration::from_secs(1),
            mime_type: "video/webm".to_string(),
            warning_secs: DEFAULT_WARNING_SECS,
        }
    }
}

impl RecorderConfig {
    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.tick.is_zero() {
            return Err(MediaError::InvalidConfiguration {
                message: "countdown tick must be non-zero".to_string(),
            });
        }
        if self.ceiling < self.tick {
            return Err(MediaError::InvalidConfiguration {
                message: format!(
                    "ceiling {:?} is shorter than one tick ({:?})",
                    self.ceiling, self.tick
                ),
            });
        }
        if !self.mime_type.starts_with("video/") {
            return Err(MediaError::InvalidConfiguration {
                message: format!("{} is not a video type", self.mime_type),
            });
        }
        Ok(())
    }

    fn total_ticks(&self) -> u32 {
        let ticks = self.ceiling.as_millis() / self.tick.as_millis().max(1);
        ticks.clamp(1, u32::MAX as u128) as u32
    }

    fn ticks_to_secs(&self, ticks: u32) -> u32 {
        (self.tick * ticks).as_secs() as u32
    }
}

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    Idle,
    /// Fragments are being produced
    Recording,
    /// Fragment production suspended; countdown still running
    Paused,
    /// Output is being assembled
    Finalizing,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Paused => "paused",
            RecorderState::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user stopped it
    Manual,
    /// The countdown reached zero
    CeilingReached,
    /// The device stream was closed while recording
    StreamClosed,
}

/// Recorder events
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// Recording began
    Started {
        /// Recording ID
        session_id: Uuid,
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// One countdown step elapsed
    Tick {
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// Few seconds remain
    Warning {
        /// Seconds until the ceiling
        remaining_secs: u32,
    },
    /// Fragment production suspended
    Paused,
    /// Fragment production resumed
    Resumed,
    /// Recording ended with media
    Finalized {
        /// Recording ID
        session_id: Uuid,
        /// What ended it
        reason: StopReason,
        /// Total bytes
        size_bytes: usize,
        /// Fragments joined
        fragments: usize,
    },
    /// Recording ended without usable media
    Failed {
        /// Recording ID
        session_id: Uuid,
        /// What ended it
        reason: StopReason,
        /// Failure description
        error: String,
    },
    /// Recording discarded
    Cancelled {
        /// Recording ID
        session_id: Uuid,
    },
}

/// Result of a finished recording
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    /// Recording ID
    pub session_id: Uuid,
    /// What ended it
    pub reason: StopReason,
    /// The recording, or why there is none
    pub result: MediaResult<CapturedMedia>,
}

struct RecordingSession {
    id: Uuid,
    handle: DeviceStreamHandle,
    engine: Box<dyn FragmentRecorder>,
    fragments: mpsc::UnboundedReceiver<Bytes>,
    chunks: Vec<Bytes>,
    remaining_ticks: u32,
    warned: bool,
    started_at: Instant,
}

impl RecordingSession {
    fn collect(&mut self) {
        while let Ok(chunk) = self.fragments.try_recv() {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
    }

    fn recorded_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}

struct RecorderCore {
    state: RecorderState,
    session: Option<RecordingSession>,
    countdown: Option<ScopedTask>,
    outcome: Option<RecordingOutcome>,
    finalized: u64,
}

/// Time-limited recorder over a device stream
pub struct BoundedRecorder {
    config: RecorderConfig,
    core: Arc<Mutex<RecorderCore>>,
    events: broadcast::Sender<RecorderEvent>,
    finished: Arc<Notify>,
    ledger: Option<ResourceLedger>,
}

impl BoundedRecorder {
    /// Create a recorder
    pub fn new(config: RecorderConfig) -> MediaResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            config,
            core: Arc::new(Mutex::new(RecorderCore {
                state: RecorderState::Idle,
                session: None,
                countdown: None,
                outcome: None,
                finalized: 0,
            })),
            events,
            finished: Arc::new(Notify::new()),
            ledger: None,
        })
    }

    /// Account the countdown timer in `ledger`
    pub fn with_ledger(mut self, ledger: ResourceLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Recorder configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        self.core.lock().state
    }

    /// Whether a recording is in progress (recording or paused)
    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            RecorderState::Recording | RecorderState::Paused
        )
    }

    /// Seconds left before the ceiling, while a recording is active
    pub fn remaining_secs(&self) -> Option<u32> {
        let core = self.core.lock();
        core.session
            .as_ref()
            .map(|s| self.config.ticks_to_secs(s.remaining_ticks))
    }

    /// Time since the active recording started
    pub fn elapsed(&self) -> Option<Duration> {
        self.core.lock().session.as_ref().map(|s| s.started_at.elapsed())
    }

    /// Fragments received so far for the active recording
    pub fn fragment_count(&self) -> usize {
        let mut core = self.core.lock();
        core.session.as_mut().map_or(0, |s| {
            s.collect();
            s.chunks.len()
        })
    }

    /// Bytes received so far for the active recording
    pub fn recorded_bytes(&self) -> usize {
        let mut core = self.core.lock();
        core.session.as_mut().map_or(0, |s| {
            s.collect();
            s.recorded_bytes()
        })
    }

    /// How many recordings have been finalized
    pub fn finalized_count(&self) -> u64 {
        self.core.lock().finalized
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// Start recording `handle`
    ///
    /// The handle must carry both a video and an audio track. The recorder
    /// takes responsibility for closing it when the recording ends.
    pub async fn start(&self, handle: &DeviceStreamHandle) -> MediaResult<Uuid> {
        let mut core = self.core.lock();
        if core.state != RecorderState::Idle {
            return Err(MediaError::RecordingActive);
        }
        for kind in [TrackKind::Video, TrackKind::Audio] {
            if !handle.has_track(kind) {
                return Err(MediaError::MissingTrack {
                    kind: kind.to_string(),
                });
            }
        }

        let mut engine = handle.source()?.create_recorder(&self.config.mime_type)?;
        let (tx, rx) = mpsc::unbounded_channel();
        engine.start(tx)?;

        let session_id = Uuid::new_v4();
        let countdown = match self.spawn_countdown(session_id) {
            Ok(task) => task,
            Err(e) => {
                let _ = engine.stop();
                return Err(e);
            }
        };

        let total_ticks = self.config.total_ticks();
        core.session = Some(RecordingSession {
            id: session_id,
            handle: handle.clone(),
            engine,
            fragments: rx,
            chunks: Vec::new(),
            remaining_ticks: total_ticks,
            warned: false,
            started_at: Instant::now(),
        });
        core.countdown = Some(countdown);
        core.outcome = None;
        core.state = RecorderState::Recording;
        drop(core);

        let remaining_secs = self.config.ticks_to_secs(total_ticks);
        info!(
            "Recording {} started on stream {} ({}s limit)",
            session_id,
            handle.id(),
            remaining_secs
        );
        let _ = self.events.send(RecorderEvent::Started {
            session_id,
            remaining_secs,
        });
        Ok(session_id)
    }

    /// Suspend fragment production
    pub fn pause(&self) -> MediaResult<()> {
        let mut core = self.core.lock();
        Self::expect_state(core.state, RecorderState::Recording)?;
        if let Some(session) = core.session.as_mut() {
            session.engine.pause()?;
            session.collect();
        }
        core.state = RecorderState::Paused;
        drop(core);

        debug!("Recording paused");
        let _ = self.events.send(RecorderEvent::Paused);
        Ok(())
    }

    /// Resume fragment production
    pub fn resume(&self) -> MediaResult<()> {
        let mut core = self.core.lock();
        Self::expect_state(core.state, RecorderState::Paused)?;
        if let Some(session) = core.session.as_mut() {
            session.engine.resume()?;
        }
        core.state = RecorderState::Recording;
        drop(core);

        debug!("Recording resumed");
        let _ = self.events.send(RecorderEvent::Resumed);
        Ok(())
    }

    /// Pause when recording, resume when paused; returns the new state
    pub fn toggle_pause(&self) -> MediaResult<RecorderState> {
        match self.state() {
            RecorderState::Recording => self.pause().map(|_| RecorderState::Paused),
            RecorderState::Paused => self.resume().map(|_| RecorderState::Recording),
            other => Err(MediaError::InvalidState {
                expected: "recording or paused".to_string(),
                actual: other.to_string(),
            }),
        }
    }

    /// Stop and finalize the active recording
    pub async fn stop(&self) -> MediaResult<CapturedMedia> {
        let outcome = {
            let mut core = self.core.lock();
            match core.state {
                RecorderState::Recording | RecorderState::Paused => {}
                other => {
                    return Err(MediaError::InvalidState {
                        expected: "recording or paused".to_string(),
                        actual: other.to_string(),
                    })
                }
            }
            if let Some(countdown) = core.countdown.take() {
                countdown.abort();
            }
            Self::finalize(&mut core, &self.config, &self.events, StopReason::Manual);
            core.outcome.take()
        };

        match outcome {
            Some(outcome) => outcome.result,
            None => Err(MediaError::InvalidState {
                expected: "finalized recording".to_string(),
                actual: "no outcome".to_string(),
            }),
        }
    }

    /// Discard the active recording, closing its stream
    pub fn cancel(&self) -> bool {
        let mut core = self.core.lock();
        if let Some(countdown) = core.countdown.take() {
            countdown.abort();
        }
        let Some(mut session) = core.session.take() else {
            return false;
        };
        core.state = RecorderState::Idle;
        drop(core);

        if let Err(e) = session.engine.stop() {
            warn!("Recorder engine failed to stop cleanly: {}", e);
        }
        session.handle.close();
        info!("Recording {} cancelled", session.id);
        let _ = self.events.send(RecorderEvent::Cancelled {
            session_id: session.id,
        });
        true
    }

    /// Take the outcome of a recording the countdown stopped
    pub fn take_outcome(&self) -> Option<RecordingOutcome> {
        self.core.lock().outcome.take()
    }

    /// Wait until the countdown stops the active recording
    pub async fn wait_finished(&self) -> RecordingOutcome {
        loop {
            let notified = self.finished.notified();
            if let Some(outcome) = self.take_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn expect_state(actual: RecorderState, expected: RecorderState) -> MediaResult<()> {
        if actual != expected {
            return Err(MediaError::InvalidState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn spawn_countdown(&self, session_id: Uuid) -> MediaResult<ScopedTask> {
        let core = self.core.clone();
        let config = self.config.clone();
        let events = self.events.clone();
        let finished = self.finished.clone();
        let tick = self.config.tick;

        let countdown = async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
            loop {
                ticker.tick().await;
                if Self::on_tick(&core, &config, &events, &finished, session_id) {
                    break;
                }
            }
        };

        let name = format!("recording-countdown-{}", session_id);
        match &self.ledger {
            Some(ledger) => ScopedTask::spawn_timer(name, ledger, countdown).map_err(|e| {
                MediaError::ResourceNotAvailable {
                    resource: e.to_string(),
                }
            }),
            None => Ok(ScopedTask::spawn(name, countdown)),
        }
    }

    /// Returns `true` when the countdown should end
    fn on_tick(
        core: &Mutex<RecorderCore>,
        config: &RecorderConfig,
        events: &broadcast::Sender<RecorderEvent>,
        finished: &Notify,
        session_id: Uuid,
    ) -> bool {
        let mut guard = core.lock();
        let step = match guard.session.as_mut() {
            Some(session) if session.id == session_id => {
                if session.handle.is_active() {
                    session.collect();
                    session.remaining_ticks = session.remaining_ticks.saturating_sub(1);
                    let remaining_secs = config.ticks_to_secs(session.remaining_ticks);
                    let warn_now = !session.warned
                        && session.remaining_ticks > 0
                        && remaining_secs <= config.warning_secs;
                    if warn_now {
                        session.warned = true;
                    }
                    Some((session.remaining_ticks, warn_now))
                } else {
                    None
                }
            }
            _ => return true,
        };

        let Some((remaining_ticks, warn_now)) = step else {
            warn!(
                "Stream for recording {} was closed elsewhere, ending it",
                session_id
            );
            Self::finish_from_countdown(guard, config, events, finished, StopReason::StreamClosed);
            return true;
        };

        let remaining_secs = config.ticks_to_secs(remaining_ticks);
        let _ = events.send(RecorderEvent::Tick { remaining_secs });
        if warn_now {
            let _ = events.send(RecorderEvent::Warning { remaining_secs });
        }
        if remaining_ticks > 0 {
            return false;
        }

        info!(
            "Recording {} reached its {:?} limit, stopping",
            session_id, config.ceiling
        );
        Self::finish_from_countdown(guard, config, events, finished, StopReason::CeilingReached);
        true
    }

    fn finish_from_countdown(
        mut guard: MutexGuard<'_, RecorderCore>,
        config: &RecorderConfig,
        events: &broadcast::Sender<RecorderEvent>,
        finished: &Notify,
        reason: StopReason,
    ) {
        // This task is the countdown; let it run out instead of aborting itself
        if let Some(countdown) = guard.countdown.take() {
            countdown.detach();
        }
        Self::finalize(&mut guard, config, events, reason);
        drop(guard);
        finished.notify_one();
    }

    fn finalize(
        core: &mut RecorderCore,
        config: &RecorderConfig,
        events: &broadcast::Sender<RecorderEvent>,
        reason: StopReason,
    ) {
        let Some(mut session) = core.session.take() else {
            return;
        };
        core.state = RecorderState::Finalizing;
        let stream_lost = !session.handle.is_active();

        if let Err(e) = session.engine.stop() {
            warn!("Recorder engine failed to stop cleanly: {}", e);
        }
        session.collect();
        session.handle.close();

        let fragments = session.chunks.len();
        let mut output = BytesMut::with_capacity(session.recorded_bytes());
        for chunk in &session.chunks {
            output.extend_from_slice(chunk);
        }

        let result = if stream_lost {
            Err(MediaError::HandleClosed {
                handle_id: session.handle.id().to_string(),
            })
        } else if output.is_empty() {
            Err(MediaError::EmptyRecording)
        } else {
            CapturedMedia::new(MediaKind::Video, output.freeze(), config.mime_type.clone())
        };

        match &result {
            Ok(media) => {
                info!(
                    "Recording {} finalized: {} bytes from {} fragments",
                    session.id,
                    media.size_bytes(),
                    fragments
                );
                let _ = events.send(RecorderEvent::Finalized {
                    session_id: session.id,
                    reason,
                    size_bytes: media.size_bytes(),
                    fragments,
                });
            }
            Err(e) => {
                warn!("Recording {} produced no media: {}", session.id, e);
                let _ = events.send(RecorderEvent::Failed {
                    session_id: session.id,
                    reason,
                    error: e.to_string(),
                });
            }
        }

        core.finalized += 1;
        core.outcome = Some(RecordingOutcome {
            session_id: session.id,
            reason,
            result,
        });
        core.state = RecorderState::Idle;
    }
}

impl fmt::Debug for BoundedRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRecorder")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for BoundedRecorder {
    fn drop(&mut self) {
        self.cancel();
    }
}

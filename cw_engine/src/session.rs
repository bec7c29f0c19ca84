//! ABOUTME: Session controller owning the single ingestion worker per stream
//! ABOUTME: Cooperative start/stop, end-of-stream looping, reconnect with backoff

use crate::{
    params::SharedParams,
    pipeline::{FrameEngine, PipelineConfig},
    runtime::{EngineSnapshot, RuntimeStats},
    sinks::EventSink,
};
use chrono::Utc;
use cw_analysis::AlertEvent;
use cw_capture::{
    DecoderSettings, FfmpegSource, ReadOutcome, SourceDescriptor, SourceKind, VideoSource,
};
use cw_config::{clamp_opacity, clamp_threshold, EngineDefaults};
use cw_core::Result;
use cw_stream::{FrameCell, SharedFrame, StreamMetrics};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Loop timing and retry policy
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay after signalling halt before the previous worker is joined,
    /// so the old loop observes the flag before its source is reclaimed
    pub transition_delay: Duration,
    /// Pacing sleep between processed frames
    pub frame_pacing: Duration,
    /// Backoff before reopening a failed network source
    pub reconnect_backoff: Duration,
    /// Consecutive reopen failures tolerated before the loop exits
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transition_delay: Duration::from_millis(100),
            frame_pacing: Duration::from_millis(10),
            reconnect_backoff: Duration::from_millis(250),
            max_reconnect_attempts: 10,
        }
    }
}

/// Factory reopening a released source during reconnect
pub type SourceFactory = Box<dyn Fn() -> Result<Box<dyn VideoSource>> + Send + Sync>;

/// Parameters for starting a session; unset fields fall back to the
/// configured engine defaults.
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Raw source descriptor (device index, file path, or URL)
    pub source: String,
    pub threshold: Option<f64>,
    pub opacity: Option<f64>,
    pub cooldown_seconds: Option<f64>,
}

struct SessionHandle {
    running: Arc<AtomicBool>,
    worker: thread::JoinHandle<()>,
}

/// Owns at most one active capture/engine session.
///
/// All mutation of session state goes through `start`, `stop`, and
/// `update_params`; consumers read through the snapshot, the frame cell,
/// and the registered sinks.
pub struct SessionController {
    defaults: EngineDefaults,
    session_config: SessionConfig,
    pipeline_config: PipelineConfig,
    decoder: DecoderSettings,
    params: Arc<SharedParams>,
    frame_cell: Arc<FrameCell>,
    metrics: StreamMetrics,
    stats: Arc<RuntimeStats>,
    sinks: Vec<Arc<dyn EventSink>>,
    active: Mutex<Option<SessionHandle>>,
}

impl SessionController {
    pub fn new(
        defaults: EngineDefaults,
        session_config: SessionConfig,
        pipeline_config: PipelineConfig,
        decoder: DecoderSettings,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        let params = Arc::new(SharedParams::new(
            defaults.density_threshold,
            defaults.heatmap_opacity,
        ));
        Self {
            defaults,
            session_config,
            pipeline_config,
            decoder,
            params,
            frame_cell: Arc::new(FrameCell::new()),
            metrics: StreamMetrics::new(),
            stats: Arc::new(RuntimeStats::new()),
            sinks,
            active: Mutex::new(None),
        }
    }

    /// Shared cell holding the latest composited frame
    pub fn frame_cell(&self) -> Arc<FrameCell> {
        Arc::clone(&self.frame_cell)
    }

    /// Streaming metrics
    pub fn metrics(&self) -> StreamMetrics {
        self.metrics.clone()
    }

    /// Whether a session is currently running
    pub fn is_running(&self) -> bool {
        self.stats.is_running()
    }

    /// Structured snapshot for programmatic polling
    pub fn snapshot(&self) -> EngineSnapshot {
        self.stats.snapshot()
    }

    /// Start a session for the given descriptor.
    ///
    /// Any previous session is fully halted and its handle released before
    /// the new source is opened; an open failure leaves no session running
    /// and nothing leaked.
    pub fn start(&self, request: StartRequest) -> Result<()> {
        let descriptor = SourceDescriptor::parse(&request.source);
        self.stop();

        let decoder = self.decoder.clone();
        let reopen_descriptor = descriptor.clone();
        let open = move || -> Result<Box<dyn VideoSource>> {
            let source = FfmpegSource::open(reopen_descriptor.clone(), decoder.clone())?;
            Ok(Box::new(source))
        };

        let source = open()?;
        let reopen: Option<SourceFactory> = match descriptor.kind() {
            SourceKind::NetworkStream => Some(Box::new(open)),
            _ => None,
        };
        info!(source = %descriptor, "Session starting");
        self.launch(source, reopen, &request)
    }

    /// Start a session over an already-open source.
    ///
    /// The seam used by tests and synthetic demos; `start` routes through
    /// it after opening the real decoder.
    pub fn start_with_source(
        &self,
        source: Box<dyn VideoSource>,
        reopen: Option<SourceFactory>,
        request: &StartRequest,
    ) -> Result<()> {
        self.stop();
        self.launch(source, reopen, request)
    }

    /// Halt the active session, if any, and release its capture handle.
    ///
    /// Cooperative: the running flag is cleared, the loop observes it on
    /// its next iteration and exits after releasing the source.
    pub fn stop(&self) {
        let handle = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.take()
        };
        let Some(handle) = handle else {
            return;
        };

        handle.running.store(false, Ordering::SeqCst);
        thread::sleep(self.session_config.transition_delay);
        if handle.worker.join().is_err() {
            error!("Ingestion worker panicked during shutdown");
        }
        self.stats.set_running(false);
        info!("Session stopped");
    }

    /// Apply new threshold/opacity to the live session (clamped; the loop
    /// picks them up by the next frame).
    pub fn update_params(&self, threshold: f64, opacity: f64) {
        self.params.update(threshold, opacity);
        debug!(
            threshold = self.params.threshold(),
            opacity = self.params.opacity(),
            "Parameters updated"
        );
    }

    /// Current (clamped) threshold and opacity
    pub fn current_params(&self) -> (f64, f64) {
        (self.params.threshold(), self.params.opacity())
    }

    fn launch(
        &self,
        source: Box<dyn VideoSource>,
        reopen: Option<SourceFactory>,
        request: &StartRequest,
    ) -> Result<()> {
        let threshold =
            clamp_threshold(request.threshold.unwrap_or(self.defaults.density_threshold));
        let opacity = clamp_opacity(request.opacity.unwrap_or(self.defaults.heatmap_opacity));
        let cooldown = request
            .cooldown_seconds
            .unwrap_or(self.defaults.alert_cooldown_seconds)
            .max(0.0);
        self.params.update(threshold, opacity);

        let mut pipeline_config = self.pipeline_config.clone();
        pipeline_config.alerts.cooldown_seconds = cooldown;
        let engine = FrameEngine::new(
            self.defaults.site_id.clone(),
            pipeline_config,
            Arc::clone(&self.params),
        );

        self.stats.reset_session();
        self.stats.set_running(true);
        self.frame_cell.clear();

        let running = Arc::new(AtomicBool::new(true));
        let worker = IngestWorker {
            source,
            reopen,
            engine,
            running: Arc::clone(&running),
            cell: Arc::clone(&self.frame_cell),
            metrics: self.metrics.clone(),
            stats: Arc::clone(&self.stats),
            sinks: self.sinks.clone(),
            config: self.session_config.clone(),
        };
        let handle = thread::Builder::new()
            .name("cw-ingest".to_string())
            .spawn(move || worker.run())?;

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        *active = Some(SessionHandle {
            running,
            worker: handle,
        });
        Ok(())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The dedicated ingestion worker: drives capture, analytics, rendering,
/// and publishing to completion for a full frame before the next.
struct IngestWorker {
    source: Box<dyn VideoSource>,
    reopen: Option<SourceFactory>,
    engine: FrameEngine,
    running: Arc<AtomicBool>,
    cell: Arc<FrameCell>,
    metrics: StreamMetrics,
    stats: Arc<RuntimeStats>,
    sinks: Vec<Arc<dyn EventSink>>,
    config: SessionConfig,
}

impl IngestWorker {
    fn run(mut self) {
        info!(kind = ?self.source.kind(), "Ingestion loop started");
        let mut sequence: u64 = 0;
        let mut reconnect_failures: u32 = 0;

        while self.running.load(Ordering::SeqCst) {
            match self.source.read() {
                Ok(ReadOutcome::Frame(frame)) => {
                    reconnect_failures = 0;
                    sequence += 1;
                    self.process_frame(&frame, sequence);
                    thread::sleep(self.config.frame_pacing);
                }
                Ok(ReadOutcome::EndOfStream) => match self.source.kind() {
                    SourceKind::FiniteFile => {
                        debug!("Finite source ended; looping back to start");
                        if !self.restart_finite() {
                            break;
                        }
                    }
                    SourceKind::NetworkStream => {
                        if !self.reconnect(&mut reconnect_failures) {
                            break;
                        }
                    }
                    SourceKind::Device => {
                        info!("Capture device stopped producing frames");
                        break;
                    }
                },
                Err(e) => match self.source.kind() {
                    SourceKind::FiniteFile => {
                        warn!(error = %e, "Read failure on finite source; restarting");
                        if !self.restart_finite() {
                            break;
                        }
                    }
                    SourceKind::NetworkStream => {
                        warn!(error = %e, "Transient read failure");
                        if !self.reconnect(&mut reconnect_failures) {
                            break;
                        }
                    }
                    SourceKind::Device => {
                        error!(error = %e, "Capture device read failed");
                        break;
                    }
                },
            }
        }

        self.source.release();
        self.stats.set_running(false);
        info!(frames = sequence, "Ingestion loop exited");
    }

    fn process_frame(&mut self, frame: &image::RgbImage, sequence: u64) {
        let result = self.engine.process(frame, sequence, Utc::now());

        if let Some(event) = &result.event {
            self.deliver(event);
        }

        match result.jpeg {
            Some(jpeg) => {
                self.cell
                    .publish(SharedFrame::new(jpeg, sequence, self.engine.quality()));
                self.metrics.frames_published.inc();
            }
            None => {
                self.metrics.encode_errors.inc();
            }
        }

        self.stats.record(
            result.sample.smoothed_density,
            result.sample.estimated_people,
            result.alert_active,
            result.event.as_ref(),
        );
    }

    /// Delivery is best effort: a failing sink is logged and skipped, the
    /// analytics loop is never interrupted.
    fn deliver(&self, event: &AlertEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event) {
                warn!(sink = sink.name(), error = %e, "Event delivery failed");
            }
        }
    }

    /// Loop a finite source back to its first frame, forgetting analytic
    /// state so the previous pass does not bias the new one.
    fn restart_finite(&mut self) -> bool {
        if let Err(e) = self.source.rewind() {
            warn!(error = %e, "Failed to rewind finite source");
            return false;
        }
        self.engine.reset();
        true
    }

    /// Release the failed source and try to reopen it after a backoff,
    /// bounded by the consecutive-failure limit.
    fn reconnect(&mut self, failures: &mut u32) -> bool {
        self.source.release();
        *failures += 1;
        if *failures > self.config.max_reconnect_attempts {
            error!(
                attempts = self.config.max_reconnect_attempts,
                "Reconnect attempts exhausted; ending session"
            );
            return false;
        }

        thread::sleep(self.config.reconnect_backoff);
        let Some(reopen) = &self.reopen else {
            warn!("No reopen path for this source; ending session");
            return false;
        };
        match reopen() {
            Ok(new_source) => {
                info!(attempt = *failures, "Source reopened");
                self.source = new_source;
                true
            }
            Err(e) => {
                // The released source reads as end-of-stream, so the loop
                // comes straight back here for the next attempt.
                warn!(attempt = *failures, error = %e, "Reopen failed");
                true
            }
        }
    }
}

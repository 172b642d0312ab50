// src/acquisition/recorder.rs
//! Cooperative capture loop
//!
//! One task multiplexes user commands, tracking frames and the completion of a pending
//! telemetry connection. Telemetry itself arrives through the router's bounded queues
//! and is drained into the session after every frame. Connecting runs on its own task
//! so a slow or missing watch never stalls tracking.

use crate::acquisition::persist::{FlushReport, SessionWriter};
use crate::acquisition::session::{RecordingSession, SessionHandle};
use crate::config::SystemConfig;
use crate::error::{CaptureError, DeviceError};
use crate::hal::traits::{FrameRenderer, TelemetryConnector, TelemetryLink, TrackingDevice};
use crate::hal::types::{ControlCommand, TrackingFrame};
use crate::pose::classifier::PoseClassifier;
use crate::pose::library::{LibraryStore, ReferencePose};
use crate::pose::vectorizer::{vectorize, PoseDescriptor};
use crate::telemetry::router::TelemetryRouter;
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// User commands consumed by the capture loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderCommand {
    Start,
    Stop,
    SetManualLabel(String),
    ClearManualLabel,
    /// Store the most recent tracked pose as a named reference
    CaptureReference(String),
    ConnectTelemetry,
    DisconnectTelemetry,
    Shutdown,
}

/// Counters reported when the loop exits
#[derive(Debug, Default)]
pub struct RecorderSummary {
    pub frames_seen: u64,
    pub frames_rejected: u64,
    pub poses_recorded: u64,
    pub telemetry_recorded: u64,
    pub recordings: Vec<FlushReport>,
}

type LinkResult = Result<Option<Box<dyn TelemetryLink>>, DeviceError>;

/// Telemetry connection state owned by the loop
#[derive(Default)]
struct Telemetry {
    link: Option<Box<dyn TelemetryLink>>,
    pending: Option<JoinHandle<LinkResult>>,
}

/// Drives a tracking device into a recording session
pub struct Recorder<D> {
    device: D,
    connector: Option<Arc<dyn TelemetryConnector>>,
    renderer: Option<Box<dyn FrameRenderer>>,
    classifier: PoseClassifier,
    library: LibraryStore,
    session: SessionHandle,
    router: TelemetryRouter,
    writer: SessionWriter,
    clock: Arc<dyn TimeProvider>,
    control_timeout: Duration,
    connect_timeout: Duration,
    last_descriptor: Option<PoseDescriptor>,
}

impl<D: TrackingDevice> Recorder<D> {
    pub fn new(device: D, library: LibraryStore, config: &SystemConfig) -> Self {
        Self {
            device,
            connector: None,
            renderer: None,
            classifier: PoseClassifier::from_config(&config.classifier),
            library,
            session: SessionHandle::new(RecordingSession::from_config(&config.recording)),
            router: TelemetryRouter::from_config(&config.telemetry),
            writer: SessionWriter::from_config(&config.recording),
            clock: Arc::new(SystemTimeProvider),
            control_timeout: Duration::from_millis(config.recording.control_timeout_ms),
            connect_timeout: Duration::from_millis(config.recording.connect_timeout_ms),
            last_descriptor: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn TelemetryConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn FrameRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_writer(mut self, writer: SessionWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Shared session, e.g. for a UI thread setting manual labels
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn library(&self) -> LibraryStore {
        self.library.clone()
    }

    /// Run until `Shutdown`, a closed command channel or the end of the tracking stream
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<RecorderCommand>,
    ) -> Result<RecorderSummary, CaptureError> {
        let info = self.device.open().await?;
        info!(device = %info.name, serial = %info.serial_number, "tracking device opened");

        let mut summary = RecorderSummary::default();
        let mut telemetry = Telemetry::default();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    match command.unwrap_or(RecorderCommand::Shutdown) {
                        RecorderCommand::Shutdown => break,
                        command => self.handle_command(command, &mut telemetry, &mut summary).await,
                    }
                }

                outcome = wait_for_link(&mut telemetry.pending) => {
                    telemetry.pending = None;
                    self.on_link_ready(outcome, &mut telemetry).await;
                }

                frame = self.device.next_frame() => match frame {
                    Ok(frame) => self.process_frame(&frame, &mut summary),
                    Err(DeviceError::Closed) => {
                        info!("tracking stream closed");
                        break;
                    }
                    Err(e) => warn!(error = %e, "tracking frame failed"),
                },
            }
        }

        self.shutdown(&mut telemetry, &mut summary).await;
        info!(
            frames = summary.frames_seen,
            rejected = summary.frames_rejected,
            recordings = summary.recordings.len(),
            "capture loop finished"
        );
        Ok(summary)
    }

    async fn handle_command(
        &mut self,
        command: RecorderCommand,
        telemetry: &mut Telemetry,
        summary: &mut RecorderSummary,
    ) {
        debug!(?command, "recorder command");
        match command {
            RecorderCommand::Start => self.start_recording(telemetry).await,
            RecorderCommand::Stop => self.stop_recording(telemetry, summary).await,
            RecorderCommand::SetManualLabel(label) => self.session.set_manual_label(label),
            RecorderCommand::ClearManualLabel => self.session.clear_manual_label(),
            RecorderCommand::CaptureReference(name) => self.capture_reference(&name),
            RecorderCommand::ConnectTelemetry => self.connect_telemetry(telemetry),
            RecorderCommand::DisconnectTelemetry => {
                disconnect_telemetry(telemetry, self.control_timeout).await
            }
            RecorderCommand::Shutdown => {}
        }
    }

    fn process_frame(&mut self, frame: &TrackingFrame, summary: &mut RecorderSummary) {
        summary.frames_seen += 1;
        let timestamp = self.clock.now_millis();
        let result = frame.primary_hand().and_then(|hand| {
            let classified = vectorize(hand).and_then(|descriptor| {
                let snapshot = self.library.snapshot();
                let result = self.classifier.classify(&descriptor.vector, &snapshot);
                self.last_descriptor = Some(descriptor);
                result
            });
            match classified {
                Ok(result) => Some(result),
                Err(e) => {
                    debug!(error = %e, "rejecting hand sample");
                    summary.frames_rejected += 1;
                    None
                }
            }
        });

        let mut session = self.session.lock();
        if !session.is_active() {
            // Keep the queues from filling while idle
            self.router.drain_into(&mut session);
            return;
        }

        if let Some(result) = &result {
            if session.record_pose(timestamp, result) {
                summary.poses_recorded += 1;
            }
        }
        if let Some(renderer) = self.renderer.as_mut() {
            let video = renderer.render(frame, result.as_ref());
            session.offer_frame(timestamp, video);
        }
        summary.telemetry_recorded += self.router.drain_into(&mut session) as u64;
    }

    async fn start_recording(&mut self, telemetry: &mut Telemetry) {
        let timestamp = self.clock.now_millis();
        self.router.drain();
        if let Err(e) = self.session.start(timestamp) {
            warn!(error = %e, "start ignored");
            return;
        }
        if let Some(link) = telemetry.link.as_mut() {
            send_control(link, ControlCommand::StartRecording(timestamp), self.control_timeout).await;
        }
    }

    /// Always completes: control failures only warn and whatever was buffered is flushed
    async fn stop_recording(&mut self, telemetry: &mut Telemetry, summary: &mut RecorderSummary) {
        let timestamp = self.clock.now_millis();
        if !self.session.is_active() {
            warn!("stop ignored, no recording in progress");
            return;
        }
        if let Some(link) = telemetry.link.as_mut() {
            send_control(link, ControlCommand::StopRecording(timestamp), self.control_timeout).await;
        }

        let stopped = {
            let mut session = self.session.lock();
            summary.telemetry_recorded += self.router.drain_into(&mut session) as u64;
            session.stop(timestamp)
        };

        match stopped {
            Ok(recording) => {
                let report = self.writer.flush(&recording);
                if !report.is_complete() {
                    warn!(
                        path = %report.directory.display(),
                        failed = report.failures.len(),
                        "recording flushed with failures"
                    );
                }
                summary.recordings.push(report);
            }
            Err(e) => warn!(error = %e, "stop ignored"),
        }
    }

    fn capture_reference(&self, name: &str) {
        let Some(descriptor) = &self.last_descriptor else {
            warn!(pose = name, "no tracked pose to capture");
            return;
        };
        if let Err(e) = self.library.add(name, ReferencePose::from_descriptor(descriptor)) {
            warn!(error = %e, "reference capture failed");
        }
    }

    fn connect_telemetry(&self, telemetry: &mut Telemetry) {
        if telemetry.link.is_some() || telemetry.pending.is_some() {
            debug!("telemetry already connected or connecting");
            return;
        }
        let Some(connector) = self.connector.clone() else {
            warn!("no telemetry connector configured, recording poses only");
            return;
        };

        let limit = self.connect_timeout;
        telemetry.pending = Some(tokio::spawn(async move {
            timeout(limit, connector.connect())
                .await
                .map_err(|_| DeviceError::Timeout {
                    operation: "telemetry connect".to_string(),
                    duration_ms: limit.as_millis() as u64,
                })?
        }));
        info!("connecting to telemetry device");
    }

    async fn on_link_ready(&mut self, outcome: LinkResult, telemetry: &mut Telemetry) {
        let mut link = match outcome {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!("no telemetry device found, recording poses only");
                return;
            }
            Err(e) => {
                warn!(error = %e, "telemetry connection failed, recording poses only");
                return;
            }
        };

        match timeout(self.control_timeout, link.subscribe(self.router.inlet())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "telemetry subscription failed");
                return;
            }
            Err(_) => {
                warn!("telemetry subscription timed out");
                return;
            }
        }

        info!(device = %link.device_info().name, "telemetry connected");
        let started_at = self.session.lock().started_at();
        if let Some(started_at) = started_at {
            send_control(&mut link, ControlCommand::StartRecording(started_at), self.control_timeout)
                .await;
        }
        telemetry.link = Some(link);
    }

    async fn shutdown(&mut self, telemetry: &mut Telemetry, summary: &mut RecorderSummary) {
        if self.session.is_active() {
            self.stop_recording(telemetry, summary).await;
        }
        disconnect_telemetry(telemetry, self.control_timeout).await;
        if let Err(e) = self.device.close().await {
            warn!(error = %e, "tracking device close failed");
        }
    }
}

async fn send_control(link: &mut Box<dyn TelemetryLink>, command: ControlCommand, limit: Duration) {
    match timeout(limit, link.send_control(command)).await {
        Ok(Ok(())) => debug!(?command, "control command sent"),
        Ok(Err(e)) => warn!(error = %e, ?command, "control command failed"),
        Err(_) => warn!(
            ?command,
            timeout_ms = limit.as_millis() as u64,
            "control command timed out"
        ),
    }
}

async fn disconnect_telemetry(telemetry: &mut Telemetry, limit: Duration) {
    if let Some(task) = telemetry.pending.take() {
        task.abort();
        info!("pending telemetry connection cancelled");
    }
    if let Some(mut link) = telemetry.link.take() {
        match timeout(limit, link.disconnect()).await {
            Ok(Ok(())) => info!("telemetry disconnected"),
            Ok(Err(e)) => warn!(error = %e, "telemetry disconnect failed"),
            Err(_) => warn!("telemetry disconnect timed out"),
        }
    }
}

async fn wait_for_link(pending: &mut Option<JoinHandle<LinkResult>>) -> LinkResult {
    match pending {
        Some(task) => match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(DeviceError::Connection(e.to_string())),
        },
        None => std::future::pending().await,
    }
}

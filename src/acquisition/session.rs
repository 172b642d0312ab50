// src/acquisition/session.rs
//! Recording session state machine
//!
//! A session is either idle or recording. While active it accumulates six independent
//! timestamp-keyed channels; stopping moves them out as a [`SessionRecording`] and
//! leaves the session empty and idle again. Appends while idle are ignored.

use crate::acquisition::channel::{ChannelKind, TimedChannel};
use crate::config::RecordingConfig;
use crate::error::SessionError;
use crate::hal::types::{TelemetrySample, TelemetryTag, VideoFrame};
use crate::pose::classifier::ClassificationResult;
use crate::utils::time::Timestamp;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active { started_at: Timestamp },
}

/// Drops video frames that arrive sooner than one frame interval after the last kept one
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval_ms: f64,
    last_captured: Option<Timestamp>,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            interval_ms: 1000.0 / target_fps.max(1) as f64,
            last_captured: None,
        }
    }

    /// Whether a frame at `timestamp` should be captured; records it if so
    pub fn admit(&mut self, timestamp: Timestamp) -> bool {
        let due = match self.last_captured {
            None => true,
            Some(last) => (timestamp - last) as f64 >= self.interval_ms,
        };
        if due {
            self.last_captured = Some(timestamp);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_captured = None;
    }
}

/// Everything captured between one start and stop
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecording {
    pub started_at: Timestamp,
    pub stopped_at: Timestamp,
    pub target_fps: u32,
    pub video: TimedChannel<VideoFrame>,
    pub poses: TimedChannel<String>,
    pub manual_labels: TimedChannel<String>,
    pub accel: TimedChannel<[f32; 3]>,
    pub gyro: TimedChannel<[f32; 3]>,
    pub ppg: TimedChannel<[f32; 3]>,
}

impl SessionRecording {
    pub fn telemetry(&self, tag: TelemetryTag) -> &TimedChannel<[f32; 3]> {
        match tag {
            TelemetryTag::Accel => &self.accel,
            TelemetryTag::Gyro => &self.gyro,
            TelemetryTag::Ppg => &self.ppg,
        }
    }

    pub fn row_count(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Video => self.video.len(),
            ChannelKind::Poses => self.poses.len(),
            ChannelKind::ManualLabels => self.manual_labels.len(),
            ChannelKind::Accel => self.accel.len(),
            ChannelKind::Gyro => self.gyro.len(),
            ChannelKind::Ppg => self.ppg.len(),
        }
    }
}

/// Recording session with its channel buffers
#[derive(Debug)]
pub struct RecordingSession {
    state: SessionState,
    target_fps: u32,
    manual_label: Option<String>,
    pacer: FramePacer,
    video: TimedChannel<VideoFrame>,
    poses: TimedChannel<String>,
    manual_labels: TimedChannel<String>,
    telemetry: [TimedChannel<[f32; 3]>; 3],
}

impl RecordingSession {
    pub fn new(target_fps: u32, initial_manual_label: &str) -> Self {
        Self {
            state: SessionState::Idle,
            target_fps,
            manual_label: Some(initial_manual_label.to_string()),
            pacer: FramePacer::new(target_fps),
            video: TimedChannel::new(),
            poses: TimedChannel::new(),
            manual_labels: TimedChannel::new(),
            telemetry: Default::default(),
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.target_fps, &config.initial_manual_label)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        match self.state {
            SessionState::Active { started_at } => Some(started_at),
            SessionState::Idle => None,
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn manual_label(&self) -> Option<&str> {
        self.manual_label.as_deref()
    }

    /// Begin a recording; every channel starts empty
    pub fn start(&mut self, timestamp: Timestamp) -> Result<(), SessionError> {
        if let SessionState::Active { started_at } = self.state {
            return Err(SessionError::AlreadyActive { started_at });
        }

        self.clear_channels();
        self.pacer.reset();
        self.state = SessionState::Active {
            started_at: timestamp,
        };
        info!(started_at = timestamp, "recording started");
        Ok(())
    }

    /// End the recording and hand over everything it captured
    pub fn stop(&mut self, timestamp: Timestamp) -> Result<SessionRecording, SessionError> {
        let SessionState::Active { started_at } = self.state else {
            return Err(SessionError::NotActive);
        };

        let [accel, gyro, ppg] = &mut self.telemetry;
        let recording = SessionRecording {
            started_at,
            stopped_at: timestamp,
            target_fps: self.target_fps,
            video: self.video.take(),
            poses: self.poses.take(),
            manual_labels: self.manual_labels.take(),
            accel: accel.take(),
            gyro: gyro.take(),
            ppg: ppg.take(),
        };
        self.state = SessionState::Idle;

        info!(
            started_at,
            stopped_at = timestamp,
            poses = recording.poses.len(),
            frames = recording.video.len(),
            "recording stopped"
        );
        Ok(recording)
    }

    /// Append a classified pose and, if one is set, the current manual label
    pub fn record_pose(&mut self, timestamp: Timestamp, result: &ClassificationResult) -> bool {
        if !self.is_active() {
            return false;
        }
        self.poses.insert(timestamp, result.label.qualified());
        if let Some(label) = &self.manual_label {
            self.manual_labels.insert(timestamp, label.clone());
        }
        true
    }

    /// Manual labels persist across recordings until changed
    pub fn set_manual_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        debug!(label = %label, "manual label set");
        self.manual_label = Some(label);
    }

    pub fn clear_manual_label(&mut self) {
        debug!("manual label cleared");
        self.manual_label = None;
    }

    pub fn record_telemetry(&mut self, sample: TelemetrySample) -> bool {
        if !self.is_active() {
            return false;
        }
        self.telemetry[sample.tag as usize].insert(sample.timestamp, sample.values);
        true
    }

    /// Capture a rendered frame unless it arrives ahead of the target frame rate
    pub fn offer_frame(&mut self, timestamp: Timestamp, frame: VideoFrame) -> bool {
        if !self.is_active() || !self.pacer.admit(timestamp) {
            return false;
        }
        self.video.insert(timestamp, frame);
        true
    }

    /// Buffered rows per channel for the recording in progress
    pub fn buffered(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Video => self.video.len(),
            ChannelKind::Poses => self.poses.len(),
            ChannelKind::ManualLabels => self.manual_labels.len(),
            ChannelKind::Accel => self.telemetry[TelemetryTag::Accel as usize].len(),
            ChannelKind::Gyro => self.telemetry[TelemetryTag::Gyro as usize].len(),
            ChannelKind::Ppg => self.telemetry[TelemetryTag::Ppg as usize].len(),
        }
    }

    fn clear_channels(&mut self) {
        self.video.clear();
        self.poses.clear();
        self.manual_labels.clear();
        for channel in self.telemetry.iter_mut() {
            channel.clear();
        }
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::from_config(&RecordingConfig::default())
    }
}

/// Shared session for producers on several tasks or threads
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<RecordingSession>>,
}

impl SessionHandle {
    pub fn new(session: RecordingSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock for a batch of operations; never hold across an await point
    pub fn lock(&self) -> MutexGuard<'_, RecordingSession> {
        self.inner.lock()
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    pub fn start(&self, timestamp: Timestamp) -> Result<(), SessionError> {
        self.lock().start(timestamp)
    }

    pub fn stop(&self, timestamp: Timestamp) -> Result<SessionRecording, SessionError> {
        self.lock().stop(timestamp)
    }

    pub fn record_pose(&self, timestamp: Timestamp, result: &ClassificationResult) -> bool {
        self.lock().record_pose(timestamp, result)
    }

    pub fn record_telemetry(&self, sample: TelemetrySample) -> bool {
        self.lock().record_telemetry(sample)
    }

    pub fn set_manual_label(&self, label: impl Into<String>) {
        self.lock().set_manual_label(label)
    }

    pub fn clear_manual_label(&self) {
        self.lock().clear_manual_label()
    }

    pub fn offer_frame(&self, timestamp: Timestamp, frame: VideoFrame) -> bool {
        self.lock().offer_frame(timestamp, frame)
    }
}

// src/hal/simulator.rs
//! Simulated tracking sensor, telemetry watch and renderer
//!
//! `SimulatedHand` replays the poses of a reference library through randomly placed
//! palms with a little jitter, so that the whole capture loop can be exercised
//! without hardware. `SimulatedWatch` streams tagged telemetry messages in the
//! device's wire format.

use crate::error::DeviceError;
use crate::hal::traits::{FrameRenderer, TelemetryConnector, TelemetryLink, TrackingDevice};
use crate::hal::types::{
    Bone, ControlCommand, DeviceInfo, Digit, Finger, Palm, PoseSample, Quat, Segment,
    TelemetryTag, TrackingFrame, Vec3, VideoFrame,
};
use crate::pose::classifier::ClassificationResult;
use crate::pose::library::{PoseLibrary, ReferencePose};
use crate::telemetry::router::TelemetryInlet;
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tracing::{debug, info};

const SEGMENT_LENGTH_MM: f32 = 25.0;
const FINGER_SPACING_MM: f32 = 18.0;

/// Build a hand whose segments point along the palm-frame directions of `vector`
pub fn synthesize(reference: &ReferencePose, palm: Palm) -> PoseSample {
    synthesize_with(reference, palm, |direction| direction)
}

fn synthesize_with(
    reference: &ReferencePose,
    palm: Palm,
    mut perturb: impl FnMut(Vec3) -> Vec3,
) -> PoseSample {
    let vector = &reference.pose_vector;
    let forward = palm.direction.normalized().unwrap_or(Palm::REST_DIRECTION);
    let normal = palm.normal.normalized().unwrap_or(Palm::REST_NORMAL);
    let side = forward
        .cross(normal)
        .normalized()
        .unwrap_or(Vec3::new(1.0, 0.0, 0.0));
    let up = side.cross(forward);

    let mut digits = [Digit::default(); 5];
    for (i, finger) in Finger::ALL.into_iter().enumerate() {
        let mut joint = palm.position + side * (FINGER_SPACING_MM * (i as f32 - 2.0));
        let mut bones = Vec::with_capacity(Segment::ALL.len());
        for segment in Segment::ALL {
            let [s, u, f] = vector.segment(finger, segment);
            let local = perturb(Vec3::new(s, u, f));
            let world = side * local.x + up * local.y + forward * local.z;
            let next = joint + world * SEGMENT_LENGTH_MM;
            bones.push(Bone::new(joint, next));
            joint = next;
        }
        digits[i] = Digit::new(bones[0], bones[1], bones[2]);
    }

    PoseSample {
        digits,
        palm,
        pinch_distance: reference.pinch_distance,
        pinch_strength: reference.pinch_strength,
    }
}

/// Tracking sensor replaying library poses in name order
pub struct SimulatedHand {
    script: Vec<(String, ReferencePose)>,
    fps: u32,
    hold_frames: u64,
    jitter: f32,
    dropout: f64,
    frame_limit: Option<u64>,
    rng: StdRng,
    ticker: Option<Interval>,
    frames_emitted: u64,
}

impl SimulatedHand {
    pub fn new(library: &PoseLibrary, fps: u32) -> Self {
        Self {
            script: library
                .iter()
                .map(|(name, pose)| (name.to_string(), pose.clone()))
                .collect(),
            fps: fps.max(1),
            hold_frames: 30,
            jitter: 0.02,
            dropout: 0.0,
            frame_limit: None,
            rng: StdRng::from_entropy(),
            ticker: None,
            frames_emitted: 0,
        }
    }

    /// Frames each pose is held before moving to the next
    pub fn with_hold_frames(mut self, frames: u64) -> Self {
        self.hold_frames = frames.max(1);
        self
    }

    /// Per-component noise added to each segment direction
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter.abs();
        self
    }

    /// Probability that a frame loses a tracked segment
    pub fn with_dropout(mut self, probability: f64) -> Self {
        self.dropout = probability.clamp(0.0, 1.0);
        self
    }

    /// Report the stream as closed after this many frames
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Pose shown by the frame with the given index
    pub fn pose_at(&self, frame_index: u64) -> Option<&str> {
        if self.script.is_empty() {
            return None;
        }
        let slot = (frame_index / self.hold_frames) as usize % self.script.len();
        Some(self.script[slot].0.as_str())
    }

    fn random_palm(&mut self) -> Palm {
        let axis = Vec3::new(
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(-1.0..1.0),
        );
        let rotation = Quat::from_axis_angle(axis, self.rng.gen_range(-0.6..0.6));
        let position = Vec3::new(
            self.rng.gen_range(-80.0..80.0),
            self.rng.gen_range(150.0..300.0),
            self.rng.gen_range(-80.0..80.0),
        );
        Palm::from_orientation(position, rotation)
    }

    fn generate(&mut self) -> TrackingFrame {
        let index = self.frames_emitted;
        let hands = if self.script.is_empty() {
            Vec::new()
        } else {
            let slot = (index / self.hold_frames) as usize % self.script.len();
            let reference = self.script[slot].1.clone();
            let palm = self.random_palm();
            let jitter = self.jitter;
            let rng = &mut self.rng;
            let mut sample = synthesize_with(&reference, palm, |d| {
                if jitter == 0.0 {
                    return d;
                }
                d + Vec3::new(
                    rng.gen_range(-jitter..=jitter),
                    rng.gen_range(-jitter..=jitter),
                    rng.gen_range(-jitter..=jitter),
                )
            });
            if self.dropout > 0.0 && self.rng.gen_bool(self.dropout) {
                let finger = self.rng.gen_range(0..Finger::ALL.len());
                sample.digits[finger].distal = None;
            }
            vec![sample]
        };

        self.frames_emitted += 1;
        TrackingFrame {
            device_timestamp: index * 1_000_000 / self.fps as u64,
            hands,
        }
    }
}

#[async_trait]
impl TrackingDevice for SimulatedHand {
    async fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
        let period = Duration::from_micros((1_000_000 / self.fps as u64).max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.frames_emitted = 0;
        info!(poses = self.script.len(), fps = self.fps, "simulated hand opened");
        Ok(self.device_info())
    }

    async fn next_frame(&mut self) -> Result<TrackingFrame, DeviceError> {
        if self.frame_limit.is_some_and(|limit| self.frames_emitted >= limit) {
            return Err(DeviceError::Closed);
        }
        let ticker = self
            .ticker
            .as_mut()
            .ok_or_else(|| DeviceError::Connection("simulated hand is not open".into()))?;
        ticker.tick().await;
        Ok(self.generate())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.ticker = None;
        debug!(frames = self.frames_emitted, "simulated hand closed");
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Simulated Hand".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: "SIM-HAND-001".to_string(),
        }
    }
}

/// Telemetry watch simulator
#[derive(Clone)]
pub struct SimulatedWatch {
    available: bool,
    connect_delay: Duration,
    period: Duration,
    batch: usize,
    controls: Arc<Mutex<Vec<ControlCommand>>>,
    clock: Arc<dyn TimeProvider>,
}

impl SimulatedWatch {
    pub fn new() -> Self {
        Self {
            available: true,
            connect_delay: Duration::from_millis(10),
            period: Duration::from_millis(20),
            batch: 4,
            controls: Arc::new(Mutex::new(Vec::new())),
            clock: Arc::new(SystemTimeProvider),
        }
    }

    /// A watch that is never found
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Message period and readings per message
    pub fn with_rate(mut self, period: Duration, batch: usize) -> Self {
        self.period = period;
        self.batch = batch.max(1);
        self
    }

    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Control writes received by every link of this watch
    pub fn control_log(&self) -> Vec<ControlCommand> {
        self.controls.lock().clone()
    }

    /// Encode readings in the watch's wire format
    pub fn encode_message(tag: TelemetryTag, readings: &[(i64, [f32; 3])]) -> String {
        let body: Vec<String> = readings
            .iter()
            .map(|(ts, [x, y, z])| format!("{},{},{},{}", ts, x, y, z))
            .collect();
        format!("{}_{}", tag.header(), body.join(";"))
    }
}

impl Default for SimulatedWatch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryConnector for SimulatedWatch {
    async fn connect(&self) -> Result<Option<Box<dyn TelemetryLink>>, DeviceError> {
        sleep(self.connect_delay).await;
        if !self.available {
            return Ok(None);
        }
        Ok(Some(Box::new(SimulatedLink {
            watch: self.clone(),
            task: None,
        })))
    }
}

struct SimulatedLink {
    watch: SimulatedWatch,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl TelemetryLink for SimulatedLink {
    async fn subscribe(&mut self, inlet: TelemetryInlet) -> Result<(), DeviceError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let period = self.watch.period;
        let batch = self.watch.batch;
        let clock = Arc::clone(&self.watch.clock);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut phase = 0.0f32;
            loop {
                ticker.tick().await;
                let now = clock.now_millis();
                let step = (period.as_millis() as i64 / batch as i64).max(1);
                for tag in TelemetryTag::ALL {
                    let readings: Vec<(i64, [f32; 3])> = (0..batch)
                        .map(|i| {
                            let t = phase + i as f32 * 0.1;
                            (now + i as i64 * step, [t.sin(), t.cos(), (t * 0.5).sin()])
                        })
                        .collect();
                    inlet.deliver(SimulatedWatch::encode_message(tag, &readings).as_bytes());
                }
                phase += batch as f32 * 0.1;
            }
        }));
        Ok(())
    }

    async fn send_control(&mut self, command: ControlCommand) -> Result<(), DeviceError> {
        debug!(command = %String::from_utf8_lossy(&command.encode()), "simulated control write");
        self.watch.controls.lock().push(command);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Simulated Watch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: "SIM-WATCH-001".to_string(),
        }
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Renders a flat frame whose brightness follows the classification similarity
#[derive(Debug, Clone)]
pub struct SimulatedRenderer {
    width: u32,
    height: u32,
}

impl SimulatedRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameRenderer for SimulatedRenderer {
    fn render(&mut self, frame: &TrackingFrame, result: Option<&ClassificationResult>) -> VideoFrame {
        let mut video = VideoFrame::blank(self.width, self.height);
        let level = result.map_or(0.0, |r| r.similarity.clamp(0.0, 1.0));
        let green = (level * 255.0) as u8;
        let red = if frame.hands.is_empty() { 0 } else { 64 };
        for pixel in video.pixels.chunks_exact_mut(3) {
            pixel[0] = red;
            pixel[1] = green;
        }
        video
    }
}

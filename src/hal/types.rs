// src/hal/types.rs
//! Core types produced by the tracking and telemetry devices

use crate::utils::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// 3D position or direction in tracking-device space (millimetres)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len <= f32::EPSILON || !len.is_finite() {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Unit quaternion (x, y, z, w) describing palm orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about `axis`
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalized().unwrap_or(Vec3::new(0.0, 1.0, 0.0));
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Hamilton product `self * other` (apply `other` first)
    pub fn mul(self, other: Quat) -> Quat {
        Quat {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid finger section between two joints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub prev_joint: Vec3,
    pub next_joint: Vec3,
}

impl Bone {
    pub fn new(prev_joint: Vec3, next_joint: Vec3) -> Self {
        Self { prev_joint, next_joint }
    }
}

/// Fingers in canonical thumb→pinky order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        };
        f.write_str(name)
    }
}

/// Finger segments in canonical proximal→distal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Proximal,
    Intermediate,
    Distal,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Proximal, Segment::Intermediate, Segment::Distal];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Proximal => "proximal",
            Segment::Intermediate => "intermediate",
            Segment::Distal => "distal",
        };
        f.write_str(name)
    }
}

/// The three tracked segments of one finger; `None` marks an untracked segment
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Digit {
    pub proximal: Option<Bone>,
    pub intermediate: Option<Bone>,
    pub distal: Option<Bone>,
}

impl Digit {
    pub fn new(proximal: Bone, intermediate: Bone, distal: Bone) -> Self {
        Self {
            proximal: Some(proximal),
            intermediate: Some(intermediate),
            distal: Some(distal),
        }
    }

    pub fn segment(&self, segment: Segment) -> Option<&Bone> {
        match segment {
            Segment::Proximal => self.proximal.as_ref(),
            Segment::Intermediate => self.intermediate.as_ref(),
            Segment::Distal => self.distal.as_ref(),
        }
    }
}

/// Palm geometry reported by the tracking device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palm {
    pub position: Vec3,
    pub orientation: Quat,
    /// Unit vector from palm centre towards the fingers
    pub direction: Vec3,
    /// Unit vector pointing out of the palm
    pub normal: Vec3,
}

impl Palm {
    /// Palm at rest faces down (-Y) with fingers pointing away from the user (-Z)
    pub const REST_DIRECTION: Vec3 = Vec3::new(0.0, 0.0, -1.0);
    pub const REST_NORMAL: Vec3 = Vec3::new(0.0, -1.0, 0.0);

    /// Derive direction and normal from an orientation quaternion
    pub fn from_orientation(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
            direction: orientation.rotate(Self::REST_DIRECTION),
            normal: orientation.rotate(Self::REST_NORMAL),
        }
    }
}

/// One hand-skeleton sample from a single tracking frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    /// Digits in `Finger::ALL` order
    pub digits: [Digit; 5],
    pub palm: Palm,
    pub pinch_distance: f32,
    pub pinch_strength: f32,
}

impl PoseSample {
    pub fn digit(&self, finger: Finger) -> &Digit {
        &self.digits[finger as usize]
    }
}

/// One tracking-device frame; only the first hand is classified
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingFrame {
    pub device_timestamp: u64,
    pub hands: Vec<PoseSample>,
}

impl TrackingFrame {
    pub fn primary_hand(&self) -> Option<&PoseSample> {
        self.hands.first()
    }
}

/// Telemetry channel selected by the message header tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TelemetryTag {
    Accel,
    Gyro,
    Ppg,
}

impl TelemetryTag {
    pub const ALL: [TelemetryTag; 3] = [TelemetryTag::Accel, TelemetryTag::Gyro, TelemetryTag::Ppg];

    pub fn from_header(tag: char) -> Option<Self> {
        match tag {
            'A' => Some(TelemetryTag::Accel),
            'G' => Some(TelemetryTag::Gyro),
            'P' => Some(TelemetryTag::Ppg),
            _ => None,
        }
    }

    pub fn header(self) -> char {
        match self {
            TelemetryTag::Accel => 'A',
            TelemetryTag::Gyro => 'G',
            TelemetryTag::Ppg => 'P',
        }
    }
}

impl fmt::Display for TelemetryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TelemetryTag::Accel => "accel",
            TelemetryTag::Gyro => "gyro",
            TelemetryTag::Ppg => "ppg",
        };
        f.write_str(name)
    }
}

/// One decoded telemetry reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: Timestamp,
    pub tag: TelemetryTag,
    pub values: [f32; 3],
}

/// Outbound control writes understood by the telemetry device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    StartRecording(Timestamp),
    StopRecording(Timestamp),
}

impl ControlCommand {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlCommand::StartRecording(ts) => format!("START:{}", ts).into_bytes(),
            ControlCommand::StopRecording(ts) => format!("STOP:{}", ts).into_bytes(),
        }
    }
}

/// Device information reported by collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub version: String,
    pub serial_number: String,
}

/// Rendered RGB8 video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 3) as usize],
        }
    }
}

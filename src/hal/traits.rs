// src/hal/traits.rs
//! Collaborator contracts for the tracking sensor, the telemetry device and rendering

use crate::error::DeviceError;
use crate::hal::types::{ControlCommand, DeviceInfo, TrackingFrame, VideoFrame};
use crate::pose::classifier::ClassificationResult;
use crate::telemetry::router::TelemetryInlet;
use async_trait::async_trait;

/// Hand-tracking sensor producing one frame per poll
#[async_trait]
pub trait TrackingDevice: Send {
    /// Connect to the sensor
    async fn open(&mut self) -> Result<DeviceInfo, DeviceError>;

    /// Wait for the next frame; must be cancel-safe
    async fn next_frame(&mut self) -> Result<TrackingFrame, DeviceError>;

    async fn close(&mut self) -> Result<(), DeviceError>;

    fn device_info(&self) -> DeviceInfo;
}

/// Discovers and connects to the wireless telemetry device.
///
/// `Ok(None)` means no device was found, which callers treat as pose-only mode.
#[async_trait]
pub trait TelemetryConnector: Send + Sync {
    async fn connect(&self) -> Result<Option<Box<dyn TelemetryLink>>, DeviceError>;
}

/// An established telemetry connection
#[async_trait]
pub trait TelemetryLink: Send + Sync {
    /// Start delivering notifications to `inlet`
    async fn subscribe(&mut self, inlet: TelemetryInlet) -> Result<(), DeviceError>;

    async fn send_control(&mut self, command: ControlCommand) -> Result<(), DeviceError>;

    async fn disconnect(&mut self) -> Result<(), DeviceError>;

    fn device_info(&self) -> DeviceInfo;
}

/// Produces the video frame captured alongside each tracking frame
pub trait FrameRenderer: Send {
    fn render(&mut self, frame: &TrackingFrame, result: Option<&ClassificationResult>) -> VideoFrame;
}

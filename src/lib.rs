//! handpose-core: hand-pose classification and multi-stream recording
//!
//! This library turns hand-tracking frames into labeled, time-aligned datasets. It features:
//!
//! - Rotation-invariant pose vectors and nearest-neighbour classification
//! - A hot-reloadable reference pose library
//! - Recording sessions fusing poses, wrist telemetry and video frames
//! - Offline alignment, label smoothing and action annotation export
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use handpose_core::acquisition::{Recorder, RecorderCommand};
//! use handpose_core::config::SystemConfig;
//! use handpose_core::hal::SimulatedHand;
//! use handpose_core::pose::{LibraryStore, PoseLibrary};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = PoseLibrary::load("poses.json")?;
//!     let hand = SimulatedHand::new(&library, 30);
//!     let store = LibraryStore::new(library);
//!
//!     let recorder = Recorder::new(hand, store, &SystemConfig::default());
//!     let (commands, rx) = mpsc::channel(8);
//!     let task = tokio::spawn(recorder.run(rx));
//!
//!     commands.send(RecorderCommand::Start).await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!     commands.send(RecorderCommand::Shutdown).await?;
//!
//!     let summary = task.await??;
//!     println!("recorded {} poses", summary.poses_recorded);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod offline;
pub mod pose;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{
    ChannelKind, Recorder, RecorderCommand, RecorderSummary, RecordingSession, SessionHandle,
    SessionWriter, TimedChannel,
};
pub use config::{ConfigLoader, SystemConfig};
pub use error::{CaptureError, Result};
pub use hal::{PoseSample, TelemetrySample, TelemetryTag, TrackingDevice, TrackingFrame};
pub use pose::{ClassificationResult, LibraryStore, PoseClassifier, PoseLabel, PoseLibrary, PoseVector};
pub use telemetry::{decode_message, TelemetryRouter};
pub use utils::time::{current_timestamp_millis, TimeProvider, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Hand-pose classification and multi-stream recording core".to_string(),
        features: vec![
            "Pose vectorization and classification".to_string(),
            "Reference library hot reload".to_string(),
            "Multi-stream recording sessions".to_string(),
            "Offline alignment and annotation".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", self.name, self.version)?;
        write!(f, "{}", self.description)?;
        for feature in &self.features {
            write!(f, "\n  - {}", feature)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_version_banner() {
        let banner = version_info().to_string();
        let mut lines = banner.lines();
        assert_eq!(lines.next(), Some(format!("{} {}", NAME, VERSION).as_str()));
        assert!(banner.contains("  - Offline alignment and annotation"));
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}

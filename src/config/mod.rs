// src/config/mod.rs
//! Configuration management

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

/// Nearest-neighbour classification settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f32,

    /// Reference library loaded at start-up
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Reload the library whenever the file changes
    #[serde(default = "defaults::watch_library")]
    pub watch_library: bool,
}

/// Recording session settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordingConfig {
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "defaults::target_fps")]
    pub target_fps: u32,

    #[serde(default = "defaults::control_timeout_ms")]
    pub control_timeout_ms: u64,

    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Manual label applied to every pose frame until changed
    #[serde(default = "defaults::initial_manual_label")]
    pub initial_manual_label: String,
}

/// Telemetry delivery settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,
}

/// Offline segment smoothing settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmoothingConfig {
    #[serde(default = "defaults::window_ms")]
    pub window_ms: i64,

    #[serde(default = "defaults::pre_transition_samples")]
    pub pre_transition_samples: usize,

    #[serde(default = "defaults::unknown_label")]
    pub unknown_label: String,

    #[serde(default = "defaults::resting_label")]
    pub resting_label: String,
}

/// Action annotation export settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnnotationConfig {
    /// `{"actionLabelData": [...]}` file; built-in labels when absent
    #[serde(default)]
    pub label_set_path: Option<PathBuf>,

    /// Document the annotation list is injected into
    #[serde(default)]
    pub template_path: Option<PathBuf>,

    #[serde(default = "defaults::object_id")]
    pub object_id: u32,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use std::path::PathBuf;

    pub fn similarity_threshold() -> f32 { pose::DEFAULT_SIMILARITY_THRESHOLD }
    pub fn watch_library() -> bool { false }

    pub fn output_dir() -> PathBuf { PathBuf::from(recording::DEFAULT_OUTPUT_DIR) }
    pub fn target_fps() -> u32 { recording::DEFAULT_TARGET_FPS }
    pub fn control_timeout_ms() -> u64 { recording::DEFAULT_CONTROL_TIMEOUT_MS }
    pub fn connect_timeout_ms() -> u64 { recording::DEFAULT_CONNECT_TIMEOUT_MS }
    pub fn initial_manual_label() -> String { labels::DEFAULT_RESTING_LABEL.to_string() }

    pub fn queue_capacity() -> usize { telemetry::DEFAULT_QUEUE_CAPACITY }

    pub fn window_ms() -> i64 { smoothing::DEFAULT_WINDOW_MS }
    pub fn pre_transition_samples() -> usize { smoothing::DEFAULT_PRE_TRANSITION_SAMPLES }
    pub fn unknown_label() -> String { labels::DEFAULT_UNKNOWN_LABEL.to_string() }
    pub fn resting_label() -> String { labels::DEFAULT_RESTING_LABEL.to_string() }

    pub fn object_id() -> u32 { annotation::DEFAULT_OBJECT_ID }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::similarity_threshold(),
            library_path: None,
            watch_library: defaults::watch_library(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            target_fps: defaults::target_fps(),
            control_timeout_ms: defaults::control_timeout_ms(),
            connect_timeout_ms: defaults::connect_timeout_ms(),
            initial_manual_label: defaults::initial_manual_label(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::queue_capacity(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_ms: defaults::window_ms(),
            pre_transition_samples: defaults::pre_transition_samples(),
            unknown_label: defaults::unknown_label(),
            resting_label: defaults::resting_label(),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            label_set_path: None,
            template_path: None,
            object_id: defaults::object_id(),
        }
    }
}

impl RecordingConfig {
    /// Minimum spacing between captured video frames
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}

/// Configuration utility functions
impl SystemConfig {
    /// Validate configuration consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let threshold = self.classifier.similarity_threshold;
        if !(pose::MIN_SIMILARITY_THRESHOLD..=pose::MAX_SIMILARITY_THRESHOLD).contains(&threshold) {
            errors.push(format!(
                "Similarity threshold ({}) must lie within [{}, {}]",
                threshold,
                pose::MIN_SIMILARITY_THRESHOLD,
                pose::MAX_SIMILARITY_THRESHOLD
            ));
        }

        if self.recording.target_fps == 0 || self.recording.target_fps > recording::MAX_TARGET_FPS {
            errors.push(format!(
                "Target frame rate ({} fps) must lie within [1, {}]",
                self.recording.target_fps,
                recording::MAX_TARGET_FPS
            ));
        }

        if self.telemetry.queue_capacity < telemetry::MIN_QUEUE_CAPACITY {
            errors.push(format!(
                "Telemetry queue capacity ({}) must be at least {}",
                self.telemetry.queue_capacity,
                telemetry::MIN_QUEUE_CAPACITY
            ));
        }

        if self.smoothing.window_ms <= 0 {
            errors.push(format!(
                "Smoothing window ({} ms) must be positive",
                self.smoothing.window_ms
            ));
        }

        if self.smoothing.unknown_label == self.smoothing.resting_label {
            errors.push("Unknown and resting labels must differ".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = SystemConfig::default();
        assert_eq!(config.classifier.similarity_threshold, 0.9);
        assert_eq!(config.smoothing.window_ms, 100);
        assert_eq!(config.smoothing.pre_transition_samples, 25);
        assert_eq!(config.recording.target_fps, 30);
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SystemConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SystemConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SystemConfig = toml::from_str(
            r#"
[recording]
target_fps = 60
        "#,
        )
        .unwrap();

        assert_eq!(config.recording.target_fps, 60);
        assert_eq!(config.recording.output_dir, PathBuf::from("recordings"));
        assert_eq!(config.classifier.similarity_threshold, 0.9);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SystemConfig::default();
        config.recording.target_fps = 0;
        config.classifier.similarity_threshold = 1.5;

        let errors = config.validate_consistency().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_frame_interval() {
        let config = RecordingConfig {
            target_fps: 25,
            ..Default::default()
        };
        assert_eq!(config.frame_interval_ms(), 40.0);
    }
}

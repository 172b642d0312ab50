// src/config/loader.rs
//! Layered configuration loader
//!
//! Defaults are overlaid by every existing TOML file in precedence order, then by
//! `HANDPOSE_<SECTION>_<KEY>` environment variables, then validated as a whole.

use crate::config::{constants::paths, SystemConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error in {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("IO error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loader
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    current_config: SystemConfig,
}

impl ConfigLoader {
    /// Create new configuration loader over the standard search paths
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            current_config: SystemConfig::default(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        self.current_config = config.clone();
        Ok(config)
    }

    /// Get current configuration
    pub fn current_config(&self) -> &SystemConfig {
        &self.current_config
    }

    /// Validate one configuration file on its own, on top of the defaults
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<SystemConfig, ConfigError> {
        let mut merged = Self::default_value()?;
        let file_value = Self::load_config_file(path.as_ref())?;
        Self::merge_toml_values(&mut merged, file_value);
        Self::into_config(merged, &path.as_ref().display().to_string())
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let toml_content = toml::to_string_pretty(&self.current_config).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        std::fs::write(path, toml_content).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged_config = Self::default_value()?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                continue;
            }
            let file_config = Self::load_config_file(config_path)?;
            Self::merge_toml_values(&mut merged_config, file_config);
            debug!(path = %config_path.display(), "merged configuration file");
        }

        self.apply_environment_overrides(&mut merged_config, std::env::vars());

        let config = Self::into_config(merged_config, "merged configuration")?;
        info!(
            threshold = config.classifier.similarity_threshold,
            fps = config.recording.target_fps,
            "configuration loaded"
        );
        Ok(config)
    }

    fn default_value() -> Result<toml::Value, ConfigError> {
        toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::ParseError {
            path: "defaults".to_string(),
            reason: e.to_string(),
        })
    }

    fn into_config(value: toml::Value, origin: &str) -> Result<SystemConfig, ConfigError> {
        let config: SystemConfig = value.try_into().map_err(|e: toml::de::Error| {
            ConfigError::ParseError {
                path: origin.to_string(),
                reason: e.to_string(),
            }
        })?;

        config
            .validate_consistency()
            .map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
        match (base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    if let Some(base_value) = base_table.get_mut(&key) {
                        Self::merge_toml_values(base_value, value);
                    } else {
                        base_table.insert(key, value);
                    }
                }
            }
            (base_value, overlay_value) => {
                *base_value = overlay_value;
            }
        }
    }

    /// `HANDPOSE_RECORDING_TARGET_FPS=60` sets `recording.target_fps`
    fn apply_environment_overrides(
        &self,
        config: &mut toml::Value,
        vars: impl Iterator<Item = (String, String)>,
    ) {
        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };
            let rest = rest.to_lowercase();
            let Some((section, field)) = rest.split_once('_') else {
                continue;
            };

            if let toml::Value::Table(root) = config {
                let table = root
                    .entry(section.to_string())
                    .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
                if let toml::Value::Table(table) = table {
                    debug!(section, field, "applying environment override");
                    table.insert(field.to_string(), Self::parse_env_value(&value));
                }
            }
        }
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else if let Ok(float_val) = value.parse::<f64>() {
            toml::Value::Float(float_val)
        } else if let Ok(bool_val) = value.parse::<bool>() {
            toml::Value::Boolean(bool_val)
        } else {
            toml::Value::String(value.to_string())
        }
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(paths::SYSTEM_CONFIG_PATH)];

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));
        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// Cross-platform directory discovery
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_without_files_gives_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/handpose.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[classifier]
similarity_threshold = 0.85

[smoothing]
window_ms = 200
        "#
        )
        .unwrap();

        let config = loader.validate_config_file(temp_file.path()).unwrap();
        assert_eq!(config.classifier.similarity_threshold, 0.85);
        assert_eq!(config.smoothing.window_ms, 200);
        assert_eq!(config.smoothing.pre_transition_samples, 25);
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[recording]
target_fps = 0
        "#
        )
        .unwrap();

        assert!(matches!(
            loader.validate_config_file(temp_file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_later_files_take_precedence() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "[recording]\ntarget_fps = 20\noutput_dir = \"a\"").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "[recording]\ntarget_fps = 50").unwrap();

        let loader = ConfigLoader::with_paths(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ])
        .with_env_prefix("HANDPOSE_TEST_UNUSED_");
        let config = loader.load_and_merge_configs().unwrap();

        assert_eq!(config.recording.target_fps, 50);
        assert_eq!(config.recording.output_dir, PathBuf::from("a"));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("HANDPOSE_RECORDING_TARGET_FPS", "60");
        std::env::set_var("HANDPOSE_CLASSIFIER_SIMILARITY_THRESHOLD", "0.8");

        let mut loader = ConfigLoader::with_paths(Vec::new());
        let config = loader.load_system_config().unwrap();

        assert_eq!(config.recording.target_fps, 60);
        assert!((config.classifier.similarity_threshold - 0.8).abs() < 1e-6);

        std::env::remove_var("HANDPOSE_RECORDING_TARGET_FPS");
        std::env::remove_var("HANDPOSE_CLASSIFIER_SIMILARITY_THRESHOLD");
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let temp_file = NamedTempFile::new().unwrap();

        assert!(loader.export_config(temp_file.path()).is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[recording]"));
        assert!(content.contains("similarity_threshold"));
    }
}

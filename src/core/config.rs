use crate::models::pose::BODY_LANDMARK_COUNT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Bridge configuration, passed as the `initialize` argument map or loaded
/// from a JSON settings file. Missing keys fall back to defaults, unknown
/// keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Pose model asset (ONNX)
    pub model_path: PathBuf,
    /// Landmarks per detection the caller expects
    pub joint_count: usize,
    /// Model input width in pixels
    pub input_width: u32,
    /// Model input height in pixels
    pub input_height: u32,
    /// Deadline applied by the timed `detectPose` path
    pub inference_timeout_ms: u64,
    /// Worker threads the engine may use internally
    pub intra_threads: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/pose_landmark_full.onnx"),
            joint_count: BODY_LANDMARK_COUNT,
            input_width: 256,
            input_height: 256,
            inference_timeout_ms: 1000,
            intra_threads: 1,
        }
    }
}

impl BridgeConfig {
    /// Build a config from a call argument map. `null` means all defaults.
    pub fn from_arguments(arguments: &serde_json::Value) -> Result<Self, ConfigError> {
        let config: BridgeConfig = if arguments.is_null() {
            Self::default()
        } else {
            serde_json::from_value(arguments.clone())?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("modelPath cannot be empty".to_string()));
        }

        if self.joint_count != BODY_LANDMARK_COUNT {
            return Err(ConfigError::Invalid(format!(
                "Unsupported joint count: {}. Detections always carry {} landmarks",
                self.joint_count, BODY_LANDMARK_COUNT
            )));
        }

        if !(16..=2048).contains(&self.input_width) || !(16..=2048).contains(&self.input_height) {
            return Err(ConfigError::Invalid(format!(
                "Invalid model input size: {}x{}. Each side must be between 16 and 2048",
                self.input_width, self.input_height
            )));
        }

        if self.inference_timeout_ms == 0 || self.inference_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid(format!(
                "Invalid inference timeout: {}ms. Must be between 1 and 60000",
                self.inference_timeout_ms
            )));
        }

        if self.intra_threads == 0 || self.intra_threads > 64 {
            return Err(ConfigError::Invalid(format!(
                "Invalid intra thread count: {}. Must be between 1 and 64",
                self.intra_threads
            )));
        }

        Ok(())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

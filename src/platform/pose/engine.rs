// Pose engine abstraction
// A loaded model instance that turns one frame into raw keypoints

use crate::core::config::BridgeConfig;
use crate::models::frame::Frame;
use crate::models::pose::{LandmarkLayout, PoseError, PoseResult, RawLandmarks};
use std::fs::File;
use tracing::debug;

/// Implement this for each inference backend.
///
/// `infer` must be deterministic for identical frame bytes and model version,
/// must not retry, and must either return a complete keypoint set or fail.
pub trait PoseEngine: Send + Sync + 'static {
    /// Load the model described by `config`
    fn load(config: &BridgeConfig) -> PoseResult<Self>
    where
        Self: Sized;

    /// Run inference on a borrowed frame
    fn infer(&self, frame: &Frame) -> PoseResult<RawLandmarks>;

    /// Human readable description of the loaded model
    fn model_info(&self) -> String;
}

/// Check that a model asset exists and can be opened for reading.
pub fn open_model_asset(config: &BridgeConfig) -> PoseResult<File> {
    File::open(&config.model_path).map_err(|e| {
        PoseError::ModelLoadFailed(format!("cannot open model asset {}: {}", config.model_path.display(), e))
    })
}

// ==============================================================================
// Null Implementation (for builds without an inference runtime)
// ==============================================================================

/// Backend used when no inference runtime is compiled in.
///
/// It validates the model asset like a real backend would, but every
/// inference yields an empty keypoint set, which the bridge reports as an
/// inference failure.
pub struct NullPoseEngine {
    config: BridgeConfig,
}

impl PoseEngine for NullPoseEngine {
    fn load(config: &BridgeConfig) -> PoseResult<Self> {
        open_model_asset(config)?;
        debug!(
            model = %config.model_path.display(),
            "Using null pose engine (enable the 'ml-onnx' feature for inference)"
        );
        Ok(Self { config: config.clone() })
    }

    fn infer(&self, frame: &Frame) -> PoseResult<RawLandmarks> {
        frame.validate()?;
        Ok(RawLandmarks::empty(LandmarkLayout::BlazePose33))
    }

    fn model_info(&self) -> String {
        format!(
            "Null pose engine, no inference runtime ({})",
            self.config.model_path.display()
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub type DefaultPoseEngine = super::onnx::OnnxPoseEngine;

#[cfg(not(feature = "ml-onnx"))]
pub type DefaultPoseEngine = NullPoseEngine;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::PixelFormat;
    use crate::models::pose::ErrorKind;

    #[test]
    fn test_null_engine_requires_model_asset() {
        let mut config = BridgeConfig::default();
        config.model_path = std::env::temp_dir().join("pose-bridge-no-such-model.onnx");
        let err = NullPoseEngine::load(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
    }

    #[test]
    fn test_null_engine_returns_no_landmarks() {
        let asset = tempfile::NamedTempFile::new().unwrap();
        let mut config = BridgeConfig::default();
        config.model_path = asset.path().to_path_buf();

        let engine = NullPoseEngine::load(&config).unwrap();
        let frame = Frame::new(vec![0; 12], 2, 2, PixelFormat::Rgb8);
        let raw = engine.infer(&frame).unwrap();
        assert!(raw.points.is_empty());
        assert!(engine.model_info().contains("Null pose engine"));
    }
}

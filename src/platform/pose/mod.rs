// Pose estimation backends
// Provides the engine trait, the default backend and frame preprocessing

pub mod engine;
pub mod preprocess;

#[cfg(feature = "ml-onnx")]
pub mod onnx;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{DefaultPoseEngine, NullPoseEngine, PoseEngine};

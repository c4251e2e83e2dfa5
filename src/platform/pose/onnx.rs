// ONNX Runtime backend (pure Rust host, native runtime)
// Supports BlazePose landmark models and MoveNet single-pose models

use super::engine::{open_model_asset, PoseEngine};
use super::preprocess::to_nchw_tensor;
use crate::core::config::BridgeConfig;
use crate::models::frame::Frame;
use crate::models::pose::{
    CoordinateSpace, LandmarkLayout, PoseError, PoseResult, RawLandmarks, RawPoint, ScoreKind,
    BODY_LANDMARK_COUNT,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// BlazePose emits x, y, z, visibility, presence per keypoint
const BLAZEPOSE_STRIDE: usize = 5;
/// MoveNet emits y, x, score per keypoint
const MOVENET_STRIDE: usize = 3;
/// Full BlazePose output: 33 body keypoints plus 6 auxiliary ones
const BLAZEPOSE_WITH_AUX: usize = 39;

pub struct OnnxPoseEngine {
    session: Mutex<Session>,
    model_path: PathBuf,
    input_width: u32,
    input_height: u32,
}

fn load_err(e: impl std::fmt::Display) -> PoseError {
    PoseError::ModelLoadFailed(e.to_string())
}

fn infer_err(e: impl std::fmt::Display) -> PoseError {
    PoseError::InferenceFailed(e.to_string())
}

impl PoseEngine for OnnxPoseEngine {
    fn load(config: &BridgeConfig) -> PoseResult<Self> {
        open_model_asset(config)?;

        let session = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(config.intra_threads)
            .map_err(load_err)?
            .commit_from_file(&config.model_path)
            .map_err(load_err)?;

        info!(
            model = %config.model_path.display(),
            input_width = config.input_width,
            input_height = config.input_height,
            "ONNX pose model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            model_path: config.model_path.clone(),
            input_width: config.input_width,
            input_height: config.input_height,
        })
    }

    fn infer(&self, frame: &Frame) -> PoseResult<RawLandmarks> {
        let data = to_nchw_tensor(frame, self.input_width, self.input_height)?;
        let shape = [1usize, 3, self.input_height as usize, self.input_width as usize];
        let input = Tensor::from_array((shape, data)).map_err(infer_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PoseError::InferenceFailed("model session poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input]).map_err(infer_err)?;
        let (_, values) = outputs[0].try_extract_tensor::<f32>().map_err(infer_err)?;

        decode_output(values, self.input_width, self.input_height)
    }

    fn model_info(&self) -> String {
        format!(
            "ONNX Runtime pose engine ({}, input {}x{})",
            self.model_path.display(),
            self.input_width,
            self.input_height
        )
    }
}

/// Interpret a flat landmark tensor by its size.
///
/// Only single-pose BlazePose (33 or 39 keypoints) and MoveNet (17
/// keypoints) layouts are recognized; anything else is an inference error.
pub(crate) fn decode_output(values: &[f32], input_width: u32, input_height: u32) -> PoseResult<RawLandmarks> {
    let blazepose = values.len() == BODY_LANDMARK_COUNT * BLAZEPOSE_STRIDE
        || values.len() == BLAZEPOSE_WITH_AUX * BLAZEPOSE_STRIDE;
    if blazepose {
        // trailing auxiliary keypoints are dropped
        let points = values
            .chunks_exact(BLAZEPOSE_STRIDE)
            .take(BODY_LANDMARK_COUNT)
            .map(|kp| RawPoint {
                x: kp[0],
                y: kp[1],
                z: kp[2],
                score: kp[3],
            })
            .collect();

        return Ok(RawLandmarks {
            layout: LandmarkLayout::BlazePose33,
            coordinates: CoordinateSpace::Pixels {
                width: input_width,
                height: input_height,
            },
            scores: ScoreKind::Logit,
            points,
        });
    }

    let coco = LandmarkLayout::Coco17.joint_count();
    if values.len() == coco * MOVENET_STRIDE {
        let points = values
            .chunks_exact(MOVENET_STRIDE)
            .map(|kp| RawPoint {
                x: kp[1],
                y: kp[0],
                z: 0.0,
                score: kp[2],
            })
            .collect();

        return Ok(RawLandmarks {
            layout: LandmarkLayout::Coco17,
            coordinates: CoordinateSpace::Normalized,
            scores: ScoreKind::Probability,
            points,
        });
    }

    Err(PoseError::InferenceFailed(format!(
        "unrecognized landmark tensor with {} values",
        values.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_blazepose_tensor() {
        let values: Vec<f32> = (0..39 * 5).map(|v| v as f32).collect();
        let raw = decode_output(&values, 256, 256).unwrap();
        assert_eq!(raw.layout, LandmarkLayout::BlazePose33);
        assert_eq!(raw.points.len(), 33);
        assert_eq!(raw.points[1].x, 5.0);
        assert_eq!(raw.points[1].score, 8.0);
    }

    #[test]
    fn test_decode_movenet_tensor() {
        let mut values = vec![0.0f32; 17 * 3];
        values[0] = 0.25; // nose y
        values[1] = 0.75; // nose x
        values[2] = 0.9;
        let raw = decode_output(&values, 192, 192).unwrap();
        assert_eq!(raw.layout, LandmarkLayout::Coco17);
        assert_eq!(raw.points[0].x, 0.75);
        assert_eq!(raw.points[0].y, 0.25);
    }

    #[test]
    fn test_decode_body_only_blazepose_tensor() {
        let values = vec![1.0f32; 33 * 5];
        let raw = decode_output(&values, 256, 256).unwrap();
        assert_eq!(raw.layout, LandmarkLayout::BlazePose33);
        assert_eq!(raw.points.len(), 33);
    }

    #[test]
    fn test_decode_rejects_unknown_shape() {
        assert!(decode_output(&[0.0; 10], 256, 256).is_err());

        // MoveNet multipose [1, 6, 56] is larger than BlazePose but not a single-pose layout
        let multipose = vec![0.5f32; 6 * 56];
        let err = decode_output(&multipose, 256, 256).unwrap_err();
        assert!(matches!(err, PoseError::InferenceFailed(_)));

        assert!(decode_output(&[0.5f32; 40 * 5], 256, 256).is_err());
    }
}

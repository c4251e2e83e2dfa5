// Data models for pose detection results and the bridge error taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Version of the public landmark schema emitted by the bridge.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of joints in the public full-body schema.
pub const BODY_LANDMARK_COUNT: usize = 33;

// ==============================================================================
// Public Landmark Schema (33 keypoints)
// ==============================================================================

/// Full-body landmark indices of the public schema (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single estimated joint in the public schema.
///
/// `x` and `y` are normalized image coordinates (0.0 = left/top edge,
/// 1.0 = right/bottom edge). Points slightly outside the frame are allowed.
/// `z` is depth relative to the hip midpoint, on roughly the same scale as `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32, // [0, 1]
}

impl Landmark {
    /// A joint the model did not report.
    pub fn absent(id: u32) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 0.0,
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }
}

// ==============================================================================
// Raw Model Output
// ==============================================================================

/// Keypoint ordering produced by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// BlazePose / MediaPipe Pose, identical to the public schema
    BlazePose33,
    /// COCO keypoints (MoveNet, YOLO-pose)
    Coco17,
}

/// COCO keypoint index -> public schema index
const COCO17_TO_BODY: [BodyLandmark; 17] = [
    BodyLandmark::Nose,
    BodyLandmark::LeftEye,
    BodyLandmark::RightEye,
    BodyLandmark::LeftEar,
    BodyLandmark::RightEar,
    BodyLandmark::LeftShoulder,
    BodyLandmark::RightShoulder,
    BodyLandmark::LeftElbow,
    BodyLandmark::RightElbow,
    BodyLandmark::LeftWrist,
    BodyLandmark::RightWrist,
    BodyLandmark::LeftHip,
    BodyLandmark::RightHip,
    BodyLandmark::LeftKnee,
    BodyLandmark::RightKnee,
    BodyLandmark::LeftAnkle,
    BodyLandmark::RightAnkle,
];

impl LandmarkLayout {
    /// Number of keypoints the model emits in this layout
    pub fn joint_count(&self) -> usize {
        match self {
            LandmarkLayout::BlazePose33 => BODY_LANDMARK_COUNT,
            LandmarkLayout::Coco17 => COCO17_TO_BODY.len(),
        }
    }

    /// Map a raw model index to its public schema index
    pub fn schema_index(&self, raw_index: usize) -> Option<usize> {
        match self {
            LandmarkLayout::BlazePose33 => (raw_index < BODY_LANDMARK_COUNT).then_some(raw_index),
            LandmarkLayout::Coco17 => COCO17_TO_BODY.get(raw_index).map(|b| b.index()),
        }
    }
}

/// Coordinate convention of raw keypoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Already in [0, 1] relative to the frame
    Normalized,
    /// Pixels relative to the model input of the given size
    Pixels { width: u32, height: u32 },
}

/// How the model reports per-keypoint confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Probability,
    Logit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub score: f32,
}

/// Model output before it is mapped onto the public schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLandmarks {
    pub layout: LandmarkLayout,
    pub coordinates: CoordinateSpace,
    pub scores: ScoreKind,
    pub points: Vec<RawPoint>,
}

impl RawLandmarks {
    /// Output of a backend that ran but found nothing
    pub fn empty(layout: LandmarkLayout) -> Self {
        Self {
            layout,
            coordinates: CoordinateSpace::Normalized,
            scores: ScoreKind::Probability,
            points: Vec::new(),
        }
    }
}

// ==============================================================================
// Detection Result
// ==============================================================================

/// Outcome of one `detectPose` call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    landmarks: Vec<Landmark>,
    timestamp_ms: i64,
    success: bool,
    error_kind: Option<ErrorKind>,
    schema_version: u32,
    inference_time_ms: u64,
}

impl DetectionResult {
    pub(crate) fn detected(landmarks: Vec<Landmark>, timestamp_ms: i64, inference_time_ms: u64) -> Self {
        Self {
            landmarks,
            timestamp_ms,
            success: true,
            error_kind: None,
            schema_version: SCHEMA_VERSION,
            inference_time_ms,
        }
    }

    pub fn failed(kind: ErrorKind, timestamp_ms: i64) -> Self {
        Self {
            landmarks: Vec::new(),
            timestamp_ms,
            success: false,
            error_kind: Some(kind),
            schema_version: SCHEMA_VERSION,
            inference_time_ms: 0,
        }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn landmark(&self, joint: BodyLandmark) -> Option<&Landmark> {
        self.landmarks.get(joint.index())
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn inference_time_ms(&self) -> u64 {
        self.inference_time_ms
    }
}

// ==============================================================================
// Session State
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Ready,
    Busy,
    Disposed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Busy => "busy",
            EngineState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

/// Wire-level error category reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "InvalidStateError")]
    InvalidState,
    #[serde(rename = "InvalidFrameError")]
    InvalidFrame,
    #[serde(rename = "BusyError")]
    Busy,
    #[serde(rename = "ModelLoadError")]
    ModelLoad,
    #[serde(rename = "InferenceError")]
    Inference,
    #[serde(rename = "TimeoutError")]
    Timeout,
    #[serde(rename = "UnsupportedOperationError")]
    UnsupportedOperation,
}

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("An inference is already in flight for this session")]
    Busy,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl PoseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoseError::InvalidState { .. } => ErrorKind::InvalidState,
            PoseError::InvalidFrame(_) => ErrorKind::InvalidFrame,
            PoseError::Busy => ErrorKind::Busy,
            PoseError::ModelLoadFailed(_) => ErrorKind::ModelLoad,
            PoseError::InferenceFailed(_) => ErrorKind::Inference,
            PoseError::Timeout(_) => ErrorKind::Timeout,
            PoseError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
        }
    }
}

pub type PoseResult<T> = Result<T, PoseError>;

//! Maps raw model output onto the public 33-joint landmark schema.
//!
//! Normalization is pure: the caller supplies the timestamp slot and the
//! measured inference time, so identical inputs always produce identical
//! results.

use crate::models::pose::{
    CoordinateSpace, DetectionResult, Landmark, PoseError, PoseResult, RawLandmarks, RawPoint,
    ScoreKind, BODY_LANDMARK_COUNT,
};

/// Convert raw model output into a [`DetectionResult`].
///
/// All-or-nothing: an empty or truncated keypoint set, or a keypoint with
/// non-finite coordinates, fails the whole detection with `InferenceFailed`.
pub fn normalize(raw: &RawLandmarks, timestamp_ms: i64, inference_time_ms: u64) -> PoseResult<DetectionResult> {
    if raw.points.is_empty() {
        return Err(PoseError::InferenceFailed("model returned no landmarks".to_string()));
    }

    let expected = raw.layout.joint_count();
    if raw.points.len() != expected {
        return Err(PoseError::InferenceFailed(format!(
            "model returned {} landmarks, {:?} layout expects {}",
            raw.points.len(),
            raw.layout,
            expected
        )));
    }

    let mut landmarks: Vec<Landmark> = (0..BODY_LANDMARK_COUNT as u32).map(Landmark::absent).collect();

    for (raw_index, point) in raw.points.iter().enumerate() {
        let Some(slot) = raw.layout.schema_index(raw_index) else {
            continue;
        };

        let (x, y, z) = to_normalized(point, raw.coordinates)?;
        landmarks[slot] = Landmark {
            id: slot as u32,
            x,
            y,
            z,
            visibility: to_visibility(point.score, raw.scores),
        };
    }

    Ok(DetectionResult::detected(landmarks, timestamp_ms, inference_time_ms))
}

fn to_normalized(point: &RawPoint, space: CoordinateSpace) -> PoseResult<(f32, f32, f32)> {
    if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
        return Err(PoseError::InferenceFailed("model returned non-finite coordinates".to_string()));
    }

    match space {
        CoordinateSpace::Normalized => Ok((point.x, point.y, point.z)),
        CoordinateSpace::Pixels { width, height } => {
            if width == 0 || height == 0 {
                return Err(PoseError::InferenceFailed("model input size is zero".to_string()));
            }
            let w = width as f32;
            let h = height as f32;
            // depth shares the horizontal scale
            Ok((point.x / w, point.y / h, point.z / w))
        }
    }
}

/// Convert a model score into a visibility in [0, 1]. Non-finite scores map to 0.
pub fn to_visibility(score: f32, kind: ScoreKind) -> f32 {
    let probability = match kind {
        ScoreKind::Probability => score,
        ScoreKind::Logit => 1.0 / (1.0 + (-score).exp()),
    };

    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

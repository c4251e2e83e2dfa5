// Scripted engine for unit tests
// First frame byte selects behavior: 0xFF fails, 0xEE is slow, anything else succeeds
// Model names select load behavior: "missing*" fails, "slow*" takes SLOW_INFERENCE

use super::engine::PoseEngine;
use crate::core::config::BridgeConfig;
use crate::models::frame::{Frame, PixelFormat};
use crate::models::pose::{
    CoordinateSpace, LandmarkLayout, PoseError, PoseResult, RawLandmarks, RawPoint, ScoreKind,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const FAIL_BYTE: u8 = 0xFF;
pub const SLOW_BYTE: u8 = 0xEE;
pub const SLOW_INFERENCE: Duration = Duration::from_millis(300);

static LOADS: Mutex<Option<HashMap<PathBuf, usize>>> = Mutex::new(None);

pub fn load_count(model_path: &Path) -> usize {
    let loads = LOADS.lock().unwrap_or_else(|p| p.into_inner());
    loads.as_ref().and_then(|m| m.get(model_path).copied()).unwrap_or(0)
}

pub fn config(model_name: &str) -> BridgeConfig {
    BridgeConfig {
        model_path: PathBuf::from(format!("test-models/{}.onnx", model_name)),
        ..BridgeConfig::default()
    }
}

pub fn frame_with(first_byte: u8) -> Frame {
    let mut data = vec![64u8; 4 * 4 * 3];
    data[0] = first_byte;
    Frame::new(data, 4, 4, PixelFormat::Rgb8)
}

pub struct ScriptedEngine;

impl PoseEngine for ScriptedEngine {
    fn load(config: &BridgeConfig) -> PoseResult<Self> {
        let name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if name.starts_with("missing") {
            return Err(PoseError::ModelLoadFailed(format!("no such model {}", name)));
        }
        if name.starts_with("slow") {
            std::thread::sleep(SLOW_INFERENCE);
        }

        let mut loads = LOADS.lock().unwrap_or_else(|p| p.into_inner());
        *loads
            .get_or_insert_with(HashMap::new)
            .entry(config.model_path.clone())
            .or_insert(0) += 1;
        Ok(Self)
    }

    fn infer(&self, frame: &Frame) -> PoseResult<RawLandmarks> {
        let data = frame.data();
        match data.first() {
            Some(&FAIL_BYTE) => return Err(PoseError::InferenceFailed("scripted fault".to_string())),
            Some(&SLOW_BYTE) => std::thread::sleep(SLOW_INFERENCE),
            _ => {}
        }

        let points = (0..LandmarkLayout::BlazePose33.joint_count())
            .map(|i| {
                let b = data[i % data.len()] as f32;
                RawPoint {
                    x: b / 255.0,
                    y: i as f32 / 33.0,
                    z: 0.0,
                    score: 2.0,
                }
            })
            .collect();

        Ok(RawLandmarks {
            layout: LandmarkLayout::BlazePose33,
            coordinates: CoordinateSpace::Normalized,
            scores: ScoreKind::Logit,
            points,
        })
    }

    fn model_info(&self) -> String {
        "scripted test engine".to_string()
    }
}

//! Method-channel dispatch.
//!
//! Callers on the application side speak in string-named calls with a JSON
//! argument map. This module decodes those into a typed [`BridgeCall`], runs
//! it against a [`BridgeChannel`] and encodes the reply envelope:
//!
//! - success: `{"success": true, ...payload}`
//! - failure: `{"success": false, "errorKind": "BusyError", "message": "..."}`

use crate::core::bridge::{BridgeChannel, SlottedDetection};
use crate::core::config::BridgeConfig;
use crate::models::frame::{Frame, PixelFormat};
use crate::models::pose::{DetectionResult, EngineState, PoseError, PoseResult};
use crate::platform::pose::{DefaultPoseEngine, PoseEngine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Channel name the application side binds to
pub const CHANNEL_NAME: &str = "cpr_trainer/pose_detection";

/// A call as it arrives over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectPoseArgs {
    image_data: Vec<u8>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    format: Option<String>,
}

/// The operations a bridge session supports
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Initialize(BridgeConfig),
    DetectPose(Frame),
    Dispose,
}

impl BridgeCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            BridgeCall::Initialize(_) => "initialize",
            BridgeCall::DetectPose(_) => "detectPose",
            BridgeCall::Dispose => "dispose",
        }
    }

    pub fn decode(call: &MethodCall) -> PoseResult<Self> {
        match call.method.as_str() {
            "initialize" => BridgeConfig::from_arguments(&call.arguments)
                .map(BridgeCall::Initialize)
                .map_err(|e| PoseError::ModelLoadFailed(e.to_string())),
            "detectPose" => {
                let args: DetectPoseArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| PoseError::InvalidFrame(format!("bad detectPose arguments: {}", e)))?;

                // Without a format the bytes are an encoded image
                let format = match args.format.as_deref() {
                    Some(name) => PixelFormat::from_string(name).map_err(PoseError::InvalidFrame)?,
                    None => PixelFormat::Encoded,
                };

                Ok(BridgeCall::DetectPose(Frame::new(
                    args.image_data,
                    args.width,
                    args.height,
                    format,
                )))
            }
            "dispose" => Ok(BridgeCall::Dispose),
            other => Err(PoseError::UnsupportedOperation(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeReply {
    Initialized(bool),
    Detection(DetectionResult),
    Disposed,
}

/// Routes channel calls to a bridge session
pub struct MethodDispatcher<E: PoseEngine = DefaultPoseEngine> {
    bridge: BridgeChannel<E>,
}

impl<E: PoseEngine> MethodDispatcher<E> {
    pub fn new(bridge: BridgeChannel<E>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &BridgeChannel<E> {
        &self.bridge
    }

    /// Execute a typed call, blocking for the whole inference
    pub fn call(&self, call: BridgeCall) -> PoseResult<BridgeReply> {
        self.run(call).1
    }

    /// Execute a typed call, bounding inference by the configured timeout
    pub async fn call_async(&self, call: BridgeCall) -> PoseResult<BridgeReply> {
        self.run_async(call).await.1
    }

    /// Decode, execute and encode a channel call
    pub fn handle(&self, call: &MethodCall) -> Value {
        debug!(method = %call.method, "dispatching call");
        let (timestamp_ms, outcome) = match self.admit(call) {
            Ok(typed) => self.run(typed),
            Err(e) => (None, Err(e)),
        };
        self.encode(&call.method, timestamp_ms, outcome)
    }

    /// Like [`handle`](Self::handle), with the inference timeout applied
    pub async fn handle_async(&self, call: &MethodCall) -> Value {
        debug!(method = %call.method, "dispatching call");
        let (timestamp_ms, outcome) = match self.admit(call) {
            Ok(typed) => self.run_async(typed).await,
            Err(e) => (None, Err(e)),
        };
        self.encode(&call.method, timestamp_ms, outcome)
    }

    /// Reject calls the session state forbids before looking at their
    /// arguments, then decode.
    fn admit(&self, call: &MethodCall) -> PoseResult<BridgeCall> {
        let operation = match call.method.as_str() {
            "initialize" => "initialize",
            "detectPose" => "detectPose",
            "dispose" => "dispose",
            _ => return BridgeCall::decode(call),
        };

        match self.bridge.state() {
            EngineState::Disposed => Err(PoseError::InvalidState {
                operation,
                state: EngineState::Disposed,
            }),
            EngineState::Uninitialized if operation == "detectPose" => Err(PoseError::InvalidState {
                operation,
                state: EngineState::Uninitialized,
            }),
            _ => BridgeCall::decode(call),
        }
    }

    fn run(&self, call: BridgeCall) -> (Option<i64>, PoseResult<BridgeReply>) {
        match call {
            BridgeCall::Initialize(config) => (None, self.bridge.initialize(config).map(BridgeReply::Initialized)),
            BridgeCall::DetectPose(frame) => detection_reply(self.bridge.detect_pose_slotted(&frame)),
            BridgeCall::Dispose => (None, self.bridge.dispose().map(|_| BridgeReply::Disposed)),
        }
    }

    async fn run_async(&self, call: BridgeCall) -> (Option<i64>, PoseResult<BridgeReply>) {
        match call {
            BridgeCall::DetectPose(frame) => {
                let timeout = self
                    .bridge
                    .config()
                    .unwrap_or_default()
                    .inference_timeout();
                detection_reply(self.bridge.detect_pose_with_timeout_slotted(frame, timeout).await)
            }
            other => self.run(other),
        }
    }

    /// `timestamp_ms` is the slot this call consumed; rejected calls report 0.
    fn encode(&self, method: &str, timestamp_ms: Option<i64>, outcome: PoseResult<BridgeReply>) -> Value {
        match outcome {
            Ok(BridgeReply::Initialized(initialized)) => json!({ "success": true, "initialized": initialized }),
            Ok(BridgeReply::Detection(result)) => match serde_json::to_value(&result) {
                Ok(body) => body,
                Err(e) => self.encode(
                    method,
                    timestamp_ms,
                    Err(PoseError::InferenceFailed(format!("unencodable result: {}", e))),
                ),
            },
            Ok(BridgeReply::Disposed) => json!({ "success": true }),
            Err(error) => {
                let kind = error.kind();
                let mut body = if method == "detectPose" {
                    serde_json::to_value(DetectionResult::failed(kind, timestamp_ms.unwrap_or(0)))
                        .unwrap_or_else(|_| json!({ "success": false, "errorKind": kind }))
                } else {
                    json!({ "success": false, "errorKind": kind })
                };
                body["message"] = Value::String(error.to_string());
                body
            }
        }
    }
}

fn detection_reply((timestamp_ms, outcome): SlottedDetection) -> (Option<i64>, PoseResult<BridgeReply>) {
    (timestamp_ms, outcome.map(BridgeReply::Detection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SessionClock;
    use crate::models::pose::BODY_LANDMARK_COUNT;
    use crate::platform::pose::testing::{self, ScriptedEngine, FAIL_BYTE};

    fn dispatcher() -> MethodDispatcher<ScriptedEngine> {
        MethodDispatcher::new(BridgeChannel::new())
    }

    fn detect_call(first_byte: u8) -> MethodCall {
        let frame = testing::frame_with(first_byte);
        MethodCall::new(
            "detectPose",
            json!({
                "imageData": frame.data(),
                "width": frame.width(),
                "height": frame.height(),
                "format": "rgb8",
            }),
        )
    }

    #[test]
    fn test_decode_typed_calls() {
        let init = BridgeCall::decode(&MethodCall::new("initialize", json!({ "modelPath": "a.onnx" }))).unwrap();
        assert_eq!(init.method_name(), "initialize");

        let detect = BridgeCall::decode(&MethodCall::new("detectPose", json!({ "imageData": [1, 2, 3] }))).unwrap();
        match detect {
            BridgeCall::DetectPose(frame) => {
                assert_eq!(frame.format(), PixelFormat::Encoded);
                assert_eq!(frame.data(), &[1, 2, 3]);
            }
            other => panic!("unexpected call {:?}", other),
        }

        assert_eq!(
            BridgeCall::decode(&MethodCall::new("dispose", Value::Null)).unwrap(),
            BridgeCall::Dispose
        );
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let reply = dispatcher().handle(&MethodCall::new("startRecording", Value::Null));
        assert_eq!(reply["success"], false);
        assert_eq!(reply["errorKind"], "UnsupportedOperationError");
        assert!(reply["message"].as_str().unwrap().contains("startRecording"));
    }

    #[test]
    fn test_bad_detect_arguments_are_invalid_frame() {
        let d = dispatcher();
        d.handle(&MethodCall::new("initialize", json!({ "modelPath": "test-models/dispatch-args.onnx" })));

        let missing = d.handle(&MethodCall::new("detectPose", json!({ "width": 4 })));
        assert_eq!(missing["errorKind"], "InvalidFrameError");

        let bad_format = d.handle(&MethodCall::new(
            "detectPose",
            json!({ "imageData": [0, 0, 0], "width": 1, "height": 1, "format": "nv21" }),
        ));
        assert_eq!(bad_format["errorKind"], "InvalidFrameError");
    }

    #[test]
    fn test_full_session_over_channel() {
        let d = dispatcher();

        let before = d.handle(&detect_call(1));
        assert_eq!(before["errorKind"], "InvalidStateError");
        assert_eq!(before["landmarks"], json!([]));

        let init = d.handle(&MethodCall::new(
            "initialize",
            json!({ "modelPath": "test-models/dispatch-session.onnx" }),
        ));
        assert_eq!(init, json!({ "success": true, "initialized": true }));

        let detected = d.handle(&detect_call(5));
        assert_eq!(detected["success"], true);
        assert_eq!(detected["landmarks"].as_array().unwrap().len(), BODY_LANDMARK_COUNT);
        assert_eq!(detected["errorKind"], Value::Null);

        let failed = d.handle(&detect_call(FAIL_BYTE));
        assert_eq!(failed["success"], false);
        assert_eq!(failed["errorKind"], "InferenceError");
        assert!(failed["timestampMs"].as_i64().unwrap() >= detected["timestampMs"].as_i64().unwrap());

        assert_eq!(d.handle(&MethodCall::new("dispose", Value::Null)), json!({ "success": true }));
        let again = d.handle(&MethodCall::new("dispose", Value::Null));
        assert_eq!(again["errorKind"], "InvalidStateError");
    }

    #[test]
    fn test_session_state_is_checked_before_arguments() {
        let d = dispatcher();

        let missing = d.handle(&MethodCall::new("detectPose", json!({ "width": 4 })));
        assert_eq!(missing["errorKind"], "InvalidStateError");
        let bad_format = d.handle(&MethodCall::new(
            "detectPose",
            json!({ "imageData": [0, 0, 0], "width": 1, "height": 1, "format": "nv21" }),
        ));
        assert_eq!(bad_format["errorKind"], "InvalidStateError");

        assert_eq!(d.handle(&MethodCall::new("dispose", Value::Null)), json!({ "success": true }));

        let detect = d.handle(&MethodCall::new("detectPose", json!({ "width": 4 })));
        assert_eq!(detect["errorKind"], "InvalidStateError");
        let init = d.handle(&MethodCall::new("initialize", json!({ "jointCount": 17 })));
        assert_eq!(init["errorKind"], "InvalidStateError");
        let dispose = d.handle(&MethodCall::new("dispose", json!("ignored")));
        assert_eq!(dispose["errorKind"], "InvalidStateError");

        let unknown = d.handle(&MethodCall::new("startRecording", Value::Null));
        assert_eq!(unknown["errorKind"], "UnsupportedOperationError");
    }

    #[tokio::test]
    async fn test_async_state_is_checked_before_arguments() {
        let d = dispatcher();
        let reply = d
            .handle_async(&MethodCall::new("detectPose", json!({ "format": "nv21" })))
            .await;
        assert_eq!(reply["errorKind"], "InvalidStateError");
    }

    #[test]
    fn test_rejected_detect_reports_no_timestamp() {
        let d = MethodDispatcher::new(BridgeChannel::<ScriptedEngine>::with_clock(SessionClock::with_source(|| 700)));
        d.handle(&MethodCall::new(
            "initialize",
            json!({ "modelPath": "test-models/dispatch-stamps.onnx" }),
        ));

        let detected = d.handle(&detect_call(1));
        assert_eq!(detected["timestampMs"], 700);

        let invalid = d.handle(&MethodCall::new(
            "detectPose",
            json!({ "imageData": [1, 2, 3], "width": 4, "height": 4, "format": "rgb8" }),
        ));
        assert_eq!(invalid["errorKind"], "InvalidFrameError");
        assert_eq!(invalid["timestampMs"], 0);

        let failed = d.handle(&detect_call(FAIL_BYTE));
        assert_eq!(failed["errorKind"], "InferenceError");
        assert_eq!(failed["timestampMs"], 700);
    }

    #[test]
    fn test_unknown_config_key_is_model_load_error() {
        let d = dispatcher();
        let reply = d.handle(&MethodCall::new(
            "initialize",
            json!({ "modelPath": "test-models/dispatch-unknown-key.onnx", "backend": "onnx" }),
        ));
        assert_eq!(reply["errorKind"], "ModelLoadError");
        assert_eq!(d.bridge().state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_initialize_with_missing_model() {
        let reply = dispatcher().handle(&MethodCall::new(
            "initialize",
            json!({ "modelPath": "test-models/missing.onnx" }),
        ));
        assert_eq!(reply["success"], false);
        assert_eq!(reply["errorKind"], "ModelLoadError");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_handle_async_applies_timeout() {
        let d = dispatcher();
        d.handle_async(&MethodCall::new(
            "initialize",
            json!({ "modelPath": "test-models/dispatch-timeout.onnx", "inferenceTimeoutMs": 100 }),
        ))
        .await;

        let reply = d.handle_async(&detect_call(testing::SLOW_BYTE)).await;
        assert_eq!(reply["errorKind"], "TimeoutError");

        tokio::time::sleep(testing::SLOW_INFERENCE * 2).await;
        let reply = d.handle_async(&detect_call(1)).await;
        assert_eq!(reply["success"], true, "unexpected reply {}", reply);
    }
}

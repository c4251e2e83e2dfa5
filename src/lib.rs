//! Native side of a pose-detection bridge.
//!
//! A caller hands camera frames across a method channel; the bridge runs a
//! pose model on them and returns a fixed, ordered 33-joint landmark set
//! with a session-monotonic timestamp, or a structured error.
//!
//! - [`core::bridge`] owns the session lifecycle
//! - [`core::dispatch`] speaks the string-keyed channel protocol
//! - [`core::normalizer`] maps model output onto the public schema
//! - [`platform::pose`] holds the inference backends

pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::bridge::BridgeChannel;
pub use crate::core::config::{BridgeConfig, ConfigError};
pub use crate::core::dispatch::{BridgeCall, BridgeReply, MethodCall, MethodDispatcher, CHANNEL_NAME};
pub use crate::models::frame::{Frame, PixelFormat};
pub use crate::models::pose::{
    BodyLandmark, DetectionResult, EngineState, ErrorKind, Landmark, PoseError, PoseResult,
};
pub use crate::platform::pose::{DefaultPoseEngine, PoseEngine};

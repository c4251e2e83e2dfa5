//! Session lifecycle for the pose bridge.
//!
//! A [`BridgeChannel`] is one session: `initialize` loads the engine,
//! `detect_pose` runs at most one inference at a time, and `dispose`
//! releases the engine for good.
//!
//! ```text
//! Uninitialized --initialize--> Ready --detect_pose--> Busy --done--> Ready
//!       |                         |                      |
//!       +---------dispose---------+--------dispose-------+--> Disposed
//! ```

use crate::core::clock::SessionClock;
use crate::core::config::BridgeConfig;
use crate::core::normalizer::normalize;
use crate::models::frame::Frame;
use crate::models::pose::{DetectionResult, EngineState, PoseError, PoseResult};
use crate::platform::pose::{DefaultPoseEngine, PoseEngine};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct SessionSlot<E> {
    state: EngineState,
    engine: Option<Arc<E>>,
    config: Option<BridgeConfig>,
}

/// A detection outcome paired with the timestamp slot it consumed, if it
/// was admitted at all
pub(crate) type SlottedDetection = (Option<i64>, PoseResult<DetectionResult>);

struct Inner<E> {
    session_id: String,
    slot: Mutex<SessionSlot<E>>,
    clock: SessionClock,
}

impl<E> Inner<E> {
    // The slot only holds plain values, so a poisoned lock is still consistent
    fn lock(&self) -> MutexGuard<'_, SessionSlot<E>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One bridge session between a native pose engine and its caller.
///
/// Cloning yields another handle to the same session.
pub struct BridgeChannel<E: PoseEngine = DefaultPoseEngine> {
    inner: Arc<Inner<E>>,
}

impl<E: PoseEngine> Clone for BridgeChannel<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: PoseEngine> Default for BridgeChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PoseEngine> BridgeChannel<E> {
    pub fn new() -> Self {
        Self::with_clock(SessionClock::new())
    }

    pub fn with_clock(clock: SessionClock) -> Self {
        Self {
            inner: Arc::new(Inner {
                session_id: Uuid::new_v4().to_string(),
                slot: Mutex::new(SessionSlot {
                    state: EngineState::Uninitialized,
                    engine: None,
                    config: None,
                }),
                clock,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Config the session was initialized with
    pub fn config(&self) -> Option<BridgeConfig> {
        self.inner.lock().config.clone()
    }

    pub fn model_info(&self) -> Option<String> {
        self.inner.lock().engine.as_ref().map(|engine| engine.model_info())
    }

    /// Latest timestamp slot consumed by this session
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.inner.clock.last()
    }

    /// Load the engine and move the session to `Ready`.
    ///
    /// Calling again on a live session is a no-op that returns `true`.
    /// The model loads without holding the session lock, so other handles
    /// can query state meanwhile; the state is checked again before the
    /// engine is installed.
    pub fn initialize(&self, config: BridgeConfig) -> PoseResult<bool> {
        let state = self.inner.lock().state;
        if let Some(live) = self.check_initialize(state)? {
            return Ok(live);
        }

        config
            .validate()
            .map_err(|e| PoseError::ModelLoadFailed(e.to_string()))?;

        let engine = E::load(&config).map_err(|e| {
            warn!(session = %self.inner.session_id, error = %e, "model load failed");
            e
        })?;

        let mut slot = self.inner.lock();
        if let Some(live) = self.check_initialize(slot.state)? {
            // another handle finished initializing first; this engine is dropped
            return Ok(live);
        }

        info!(
            session = %self.inner.session_id,
            model = %engine.model_info(),
            "pose bridge initialized"
        );

        slot.engine = Some(Arc::new(engine));
        slot.config = Some(config);
        slot.state = EngineState::Ready;
        Ok(true)
    }

    /// `Some(true)` when the session is already live, an error when it is disposed.
    fn check_initialize(&self, state: EngineState) -> PoseResult<Option<bool>> {
        match state {
            EngineState::Ready | EngineState::Busy => {
                debug!(session = %self.inner.session_id, "initialize on live session ignored");
                Ok(Some(true))
            }
            EngineState::Disposed => {
                warn!(session = %self.inner.session_id, "initialize rejected: session disposed");
                Err(PoseError::InvalidState {
                    operation: "initialize",
                    state: EngineState::Disposed,
                })
            }
            EngineState::Uninitialized => Ok(None),
        }
    }

    /// Run one blocking inference on `frame`.
    pub fn detect_pose(&self, frame: &Frame) -> PoseResult<DetectionResult> {
        self.detect_pose_slotted(frame).1
    }

    /// Run one inference on a blocking worker, giving up after `timeout`.
    ///
    /// A late result is discarded. The session stays `Busy` until the
    /// abandoned inference really finishes.
    pub async fn detect_pose_with_timeout(&self, frame: Frame, timeout: Duration) -> PoseResult<DetectionResult> {
        self.detect_pose_with_timeout_slotted(frame, timeout).await.1
    }

    pub(crate) fn detect_pose_slotted(&self, frame: &Frame) -> SlottedDetection {
        match self.begin_inference(frame) {
            Ok(ticket) => (Some(ticket.timestamp_ms), ticket.run(frame)),
            Err(e) => (None, Err(e)),
        }
    }

    pub(crate) async fn detect_pose_with_timeout_slotted(&self, frame: Frame, timeout: Duration) -> SlottedDetection {
        let ticket = match self.begin_inference(&frame) {
            Ok(ticket) => ticket,
            Err(e) => return (None, Err(e)),
        };
        let timestamp_ms = ticket.timestamp_ms;
        let worker = tokio::task::spawn_blocking(move || ticket.run(&frame));

        let outcome = match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PoseError::InferenceFailed(format!("inference worker failed: {}", e))),
            Err(_) => {
                warn!(
                    session = %self.inner.session_id,
                    timestamp_ms,
                    timeout_ms = timeout.as_millis() as u64,
                    "detectPose timed out, result will be discarded"
                );
                Err(PoseError::Timeout(timeout))
            }
        };
        (Some(timestamp_ms), outcome)
    }

    /// Release the engine. Irreversible.
    pub fn dispose(&self) -> PoseResult<()> {
        let mut slot = self.inner.lock();

        if slot.state == EngineState::Disposed {
            return Err(PoseError::InvalidState {
                operation: "dispose",
                state: EngineState::Disposed,
            });
        }

        if slot.state == EngineState::Busy {
            warn!(session = %self.inner.session_id, "disposing with an inference in flight");
        }

        // An in-flight inference holds its own handle; the model is freed when it finishes
        slot.engine = None;
        slot.state = EngineState::Disposed;

        info!(session = %self.inner.session_id, "pose bridge disposed");
        Ok(())
    }

    /// Check state and frame, then claim the session and a timestamp slot
    /// for one inference.
    fn begin_inference(&self, frame: &Frame) -> PoseResult<InferenceTicket<E>> {
        let mut slot = self.inner.lock();

        match slot.state {
            EngineState::Ready => {}
            EngineState::Busy => {
                debug!(session = %self.inner.session_id, "detectPose rejected: busy");
                return Err(PoseError::Busy);
            }
            state => {
                debug!(session = %self.inner.session_id, %state, "detectPose rejected");
                return Err(PoseError::InvalidState {
                    operation: "detectPose",
                    state,
                });
            }
        }

        frame.validate()?;

        let engine = slot.engine.clone().ok_or(PoseError::InvalidState {
            operation: "detectPose",
            state: slot.state,
        })?;
        slot.state = EngineState::Busy;
        let timestamp_ms = self.inner.clock.next();

        Ok(InferenceTicket {
            inner: self.inner.clone(),
            engine,
            timestamp_ms,
        })
    }
}

/// Exclusive claim on a session for a single inference.
///
/// Dropping it returns a `Busy` session to `Ready`, including on panic.
struct InferenceTicket<E: PoseEngine> {
    inner: Arc<Inner<E>>,
    engine: Arc<E>,
    timestamp_ms: i64,
}

impl<E: PoseEngine> InferenceTicket<E> {
    fn run(self, frame: &Frame) -> PoseResult<DetectionResult> {
        let timestamp_ms = self.timestamp_ms;
        let started = Instant::now();
        let outcome = self.engine.infer(frame);
        let inference_time_ms = started.elapsed().as_millis() as u64;

        if self.inner.lock().state == EngineState::Disposed {
            debug!(session = %self.inner.session_id, "discarding result of disposed session");
            return Err(PoseError::InvalidState {
                operation: "detectPose",
                state: EngineState::Disposed,
            });
        }

        let result = outcome.and_then(|raw| normalize(&raw, timestamp_ms, inference_time_ms));
        match &result {
            Ok(_) => debug!(
                session = %self.inner.session_id,
                timestamp_ms,
                inference_time_ms,
                "detectPose completed"
            ),
            Err(e) => warn!(session = %self.inner.session_id, timestamp_ms, error = %e, "detectPose failed"),
        }
        result
    }
}

impl<E: PoseEngine> Drop for InferenceTicket<E> {
    fn drop(&mut self) {
        let mut slot = self.inner.lock();
        if slot.state == EngineState::Busy {
            slot.state = EngineState::Ready;
        }
    }
}

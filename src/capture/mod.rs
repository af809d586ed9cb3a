// SPDX-License-Identifier: GPL-3.0-only

//! Barcode capture
//!
//! [`BarcodeCaptureController`] acquires a camera, drives one
//! [`DetectionStrategy`] against the live stream and reports the decoded
//! value through a one-shot callback.
//!
//! ```text
//! Idle → Requesting → Scanning → Detected → Idle
//!            │            │
//!            └────────────┴──→ Failed → Idle
//! ```
//!
//! Every session carries a generation number. Work started for an older
//! generation (a slow acquisition, an in-flight detection) finds the
//! generation changed when it completes and releases whatever it produced.

#[cfg(feature = "software-decoder")]
pub mod decoder;
pub mod fallback;
pub mod native;
pub mod strategy;

#[cfg(feature = "software-decoder")]
pub use decoder::QrDecoder;
pub use fallback::{FallbackDecoder, SoftwareDecoder};
pub use native::{NativeDetector, PlatformBarcodeDetector};
pub use strategy::{BarcodeFormat, DecodedValue, Detection, DetectionStrategy, StrategyKind};

use crate::backends::camera::{CameraBackend, FrameSource, MediaStream, StreamConstraints};
use crate::errors::{CameraError, CaptureError, DetectionError, UnsupportedError};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Waiting for the camera
    Requesting,
    Scanning,
    Detected,
    Failed,
}

/// Snapshot of the controller published on every transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStatus {
    pub generation: u64,
    pub state: CaptureState,
    pub strategy: Option<StrategyKind>,
    /// Why the latest session ended, kept until the next session starts
    pub error: Option<CaptureError>,
}

impl CaptureStatus {
    /// User-facing status line
    pub fn message(&self) -> String {
        if let Some(error) = &self.error {
            return error.to_string();
        }
        match (self.state, self.strategy) {
            (CaptureState::Idle, _) => "Ready to scan".to_string(),
            (CaptureState::Requesting, _) => "Requesting camera access".to_string(),
            (CaptureState::Scanning, Some(kind)) => format!("Scanning with {}", kind),
            (CaptureState::Scanning, None) => "Scanning".to_string(),
            (CaptureState::Detected, _) => "Barcode detected".to_string(),
            (CaptureState::Failed, _) => "Scan failed".to_string(),
        }
    }
}

type DetectedCallback = Box<dyn FnOnce(DecodedValue) + Send>;

struct Session {
    generation: u64,
    state: CaptureState,
    /// Index into the controller's strategy list
    strategy: Option<usize>,
    media: Option<MediaStream>,
    cancel: CancellationToken,
    on_detected: Option<DetectedCallback>,
    error: Option<CaptureError>,
    constraints: StreamConstraints,
}

struct Inner {
    backend: Arc<dyn CameraBackend>,
    /// Preference order: the first available strategy wins
    strategies: Vec<Arc<dyn DetectionStrategy>>,
    session: Mutex<Session>,
    status_tx: watch::Sender<CaptureStatus>,
}

/// Strategies in preference order: platform detector, then software decoder
pub fn default_strategies() -> Vec<Arc<dyn DetectionStrategy>> {
    vec![
        Arc::new(NativeDetector::unavailable()),
        Arc::new(FallbackDecoder::default()),
    ]
}

/// Owns the camera and the polling loop of one capture session at a time
///
/// Dropping the controller stops the active session.
pub struct BarcodeCaptureController {
    inner: Arc<Inner>,
}

impl BarcodeCaptureController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        strategies: Vec<Arc<dyn DetectionStrategy>>,
    ) -> Self {
        let (status_tx, _) = watch::channel(CaptureStatus::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                strategies,
                session: Mutex::new(Session {
                    generation: 0,
                    state: CaptureState::Idle,
                    strategy: None,
                    media: None,
                    cancel: CancellationToken::new(),
                    on_detected: None,
                    error: None,
                    constraints: StreamConstraints::default(),
                }),
                status_tx,
            }),
        }
    }

    /// Constraints used for every later acquisition
    pub fn with_constraints(self, constraints: StreamConstraints) -> Self {
        self.inner.lock().constraints = constraints;
        self
    }

    pub fn status(&self) -> CaptureStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn state(&self) -> CaptureState {
        self.inner.lock().state
    }

    /// Receive every published status
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Live tracks held by the current session
    pub fn live_track_count(&self) -> usize {
        self.inner
            .lock()
            .media
            .as_ref()
            .map(MediaStream::live_track_count)
            .unwrap_or(0)
    }

    /// Start a capture session
    ///
    /// An active session is stopped first. Returns once scanning has begun;
    /// `on_detected` runs at most once, from the scanning task, after the
    /// camera has been released.
    pub async fn start<F>(&self, on_detected: F) -> Result<(), CaptureError>
    where
        F: FnOnce(DecodedValue) + Send + 'static,
    {
        self.start_session(Box::new(on_detected)).await.map(|_| ())
    }

    /// Run one session to completion and return the decoded value
    ///
    /// Ends with [`CaptureError::Cancelled`] when the session is stopped or
    /// replaced before anything is decoded.
    pub async fn scan(&self) -> Result<DecodedValue, CaptureError> {
        let (tx, mut rx) = oneshot::channel();
        let mut status_rx = self.subscribe();
        let generation = self
            .start_session(Box::new(move |value| {
                let _ = tx.send(value);
            }))
            .await?;

        loop {
            tokio::select! {
                value = &mut rx => {
                    return value.map_err(|_| self.session_error(generation));
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        return Err(CaptureError::Cancelled);
                    }
                    let status = status_rx.borrow_and_update().clone();
                    if status.generation != generation {
                        return Err(CaptureError::Cancelled);
                    }
                    if let Some(error) = status.error {
                        return Err(error);
                    }
                }
            }
        }
    }

    /// Stop the active session, if any
    ///
    /// Releases the camera, resets the strategy, drops the pending callback
    /// and returns to Idle. Results of detections still in flight are
    /// discarded. Harmless when already idle.
    pub fn stop(&self) {
        let mut session = self.inner.lock();
        if session.state == CaptureState::Idle && session.media.is_none() {
            return;
        }

        debug!(generation = session.generation, state = ?session.state, "Stopping capture session");
        session.generation += 1;
        session.cancel.cancel();
        self.inner.release(&mut session);
        session.on_detected = None;
        session.error = None;
        session.state = CaptureState::Idle;
        self.inner.publish(&session);
    }

    async fn start_session(&self, on_detected: DetectedCallback) -> Result<u64, CaptureError> {
        self.stop();

        let (generation, cancel, constraints) = {
            let mut session = self.inner.lock();
            session.generation += 1;
            session.state = CaptureState::Requesting;
            session.error = None;
            session.cancel = CancellationToken::new();
            self.inner.publish(&session);
            (
                session.generation,
                session.cancel.clone(),
                session.constraints.clone(),
            )
        };

        let Some(index) = self.inner.strategies.iter().position(|s| s.is_available()) else {
            let error = CaptureError::Unsupported(UnsupportedError::new(
                "no barcode detector or software decoder is available",
            ));
            warn!("{}", error);
            let mut session = self.inner.lock();
            if session.generation == generation {
                session.state = CaptureState::Idle;
                session.error = Some(error.clone());
                self.inner.publish(&session);
            }
            return Err(error);
        };

        {
            let mut session = self.inner.lock();
            if session.generation != generation {
                return Err(CaptureError::Cancelled);
            }
            session.strategy = Some(index);
            self.inner.publish(&session);
        }
        info!(
            generation,
            strategy = %self.inner.strategies[index].kind(),
            "Starting barcode capture"
        );

        let media = match self.inner.acquire(constraints).await {
            Ok(media) => media,
            Err(e) => {
                warn!(error = %e, "Camera acquisition failed");
                self.inner.fail(generation, e.clone());
                return Err(e.into());
            }
        };

        {
            let mut session = self.inner.lock();
            if session.generation != generation || cancel.is_cancelled() {
                drop(session);
                debug!(generation, "Session ended while acquiring; releasing camera");
                media.stop_all_tracks();
                return Err(CaptureError::Cancelled);
            }
            info!(device = %media.device().path, stream = %media.id(), "Camera acquired, scanning");
            session.media = Some(media);
            session.on_detected = Some(on_detected);
            session.state = CaptureState::Scanning;
            self.inner.publish(&session);
        }

        tokio::spawn(scan_loop(Arc::clone(&self.inner), generation, cancel));
        Ok(generation)
    }

    fn session_error(&self, generation: u64) -> CaptureError {
        let status = self.status();
        match status.error {
            Some(error) if status.generation == generation => error,
            _ => CaptureError::Cancelled,
        }
    }
}

impl Drop for BarcodeCaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, session: &Session) {
        self.status_tx.send_replace(CaptureStatus {
            generation: session.generation,
            state: session.state,
            strategy: session.strategy.map(|i| self.strategies[i].kind()),
            error: session.error.clone(),
        });
    }

    /// Stop the session's tracks and reset its strategy
    fn release(&self, session: &mut Session) {
        if let Some(media) = session.media.take() {
            media.stop_all_tracks();
            debug!(stream = %media.id(), "Camera released");
        }
        if let Some(index) = session.strategy.take() {
            self.strategies[index].reset();
        }
    }

    async fn acquire(&self, constraints: StreamConstraints) -> Result<MediaStream, CameraError> {
        let backend = Arc::clone(&self.backend);
        // Opening a device blocks; keep it off the async workers
        tokio::task::spawn_blocking(move || backend.acquire(&constraints))
            .await
            .map_err(|e| CameraError::InitializationFailed(format!("camera task failed: {}", e)))?
    }

    /// Strategy and frames to poll, while `generation` is still scanning
    fn scanning_target(
        &self,
        generation: u64,
    ) -> Option<(Arc<dyn DetectionStrategy>, Arc<dyn FrameSource>)> {
        let session = self.lock();
        if session.generation != generation || session.state != CaptureState::Scanning {
            return None;
        }
        let strategy = Arc::clone(&self.strategies[session.strategy?]);
        let frames = session.media.as_ref()?.frames();
        Some((strategy, frames))
    }

    /// Release everything, pass through Failed and settle in Idle
    fn fail(&self, generation: u64, error: CameraError) {
        let mut session = self.lock();
        if session.generation != generation {
            return;
        }
        self.release(&mut session);
        session.error = Some(error.into());
        session.state = CaptureState::Failed;
        self.publish(&session);
        session.on_detected = None;
        session.state = CaptureState::Idle;
        self.publish(&session);
    }

    fn finish_detected(&self, generation: u64, value: DecodedValue) {
        let callback = {
            let mut session = self.lock();
            if session.generation != generation || session.state != CaptureState::Scanning {
                debug!(generation, "Discarding detection from a finished session");
                return;
            }
            self.release(&mut session);
            session.state = CaptureState::Detected;
            self.publish(&session);
            session.on_detected.take()
        };

        info!(generation, format = ?value.format, "Barcode detected");
        if let Some(callback) = callback {
            callback(value);
        }

        let mut session = self.lock();
        if session.generation == generation && session.state == CaptureState::Detected {
            session.state = CaptureState::Idle;
            self.publish(&session);
        }
    }

    /// Move a failing session onto the next available strategy
    ///
    /// Returns whether scanning continues.
    async fn handoff(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        error: DetectionError,
    ) -> bool {
        let (current, constraints) = {
            let session = self.lock();
            if session.generation != generation || session.state != CaptureState::Scanning {
                return false;
            }
            (session.strategy, session.constraints.clone())
        };

        let next = current.and_then(|current| {
            (current + 1..self.strategies.len()).find(|&i| self.strategies[i].is_available())
        });
        let Some(next) = next else {
            warn!(error = %error, "Detection failed with no strategy left");
            self.fail(generation, CameraError::ScanFailed(error.0));
            return false;
        };

        warn!(
            error = %error,
            to = %self.strategies[next].kind(),
            "Detection failed, switching strategy"
        );
        {
            let mut session = self.lock();
            if session.generation != generation {
                return false;
            }
            self.release(&mut session);
            session.strategy = Some(next);
            session.state = CaptureState::Requesting;
            self.publish(&session);
        }

        let media = match self.acquire(constraints).await {
            Ok(media) => media,
            Err(e) => {
                warn!(error = %e, "Camera re-acquisition failed");
                self.fail(generation, e);
                return false;
            }
        };

        let mut session = self.lock();
        if session.generation != generation
            || session.state != CaptureState::Requesting
            || cancel.is_cancelled()
        {
            drop(session);
            media.stop_all_tracks();
            return false;
        }
        session.media = Some(media);
        session.state = CaptureState::Scanning;
        self.publish(&session);
        true
    }
}

async fn scan_loop(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some((strategy, frames)) = inner.scanning_target(generation) else {
            break;
        };

        match strategy.detect_once(frames.as_ref()).await {
            Ok(Detection::Decoded(value)) => {
                inner.finish_detected(generation, value);
                break;
            }
            Ok(Detection::NoMatch) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(strategy.poll_interval()) => {}
                }
            }
            Err(e) => {
                if !inner.handoff(generation, &cancel, e).await {
                    break;
                }
            }
        }
    }
    trace!(generation, "Scan loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let mut status = CaptureStatus {
            state: CaptureState::Scanning,
            strategy: Some(StrategyKind::Fallback),
            ..Default::default()
        };
        assert_eq!(status.message(), "Scanning with software decoder");

        status.error = Some(CaptureError::Camera(CameraError::PermissionDenied));
        assert_eq!(status.message(), "Camera permission denied");
    }

    #[test]
    fn test_default_strategy_order() {
        let strategies = default_strategies();
        assert_eq!(strategies[0].kind(), StrategyKind::Native);
        assert!(!strategies[0].is_available());
        assert_eq!(strategies[1].kind(), StrategyKind::Fallback);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_harmless() {
        let backend = Arc::new(crate::backends::camera::FileCameraBackend::new(Vec::new()));
        let controller = BarcodeCaptureController::new(backend, default_strategies());
        controller.stop();
        assert_eq!(controller.status(), CaptureStatus::default());
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Shared fakes for integration tests

#![allow(dead_code)]

use asset_tracker::backends::camera::{
    BackendResult, CameraBackend, CameraDevice, CameraFrame, FacingMode, FrameSource, MediaStream,
    MediaTrack, PixelFormat, StreamConstraints,
};
use asset_tracker::capture::{Detection, DetectionStrategy, StrategyKind};
use asset_tracker::errors::{CameraError, DetectionError, InfrastructureError};
use asset_tracker::store::{EntityStream, RecordStore, TableEntity};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Camera whose tracks report to a shared live-track counter
#[derive(Default)]
pub struct ScriptedCamera {
    live: Arc<AtomicUsize>,
    acquisitions: AtomicUsize,
    /// Errors returned by the next acquisitions, in order
    failures: Mutex<VecDeque<CameraError>>,
    /// Blocking delay inside `acquire`
    delay: Mutex<Option<Duration>>,
}

impl ScriptedCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_with(error: CameraError) -> Arc<Self> {
        let camera = Self::default();
        camera.failures.lock().unwrap().push_back(error);
        Arc::new(camera)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        let camera = Self::default();
        *camera.delay.lock().unwrap() = Some(delay);
        Arc::new(camera)
    }

    /// Tracks acquired and not yet stopped, across every stream
    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl CameraBackend for ScriptedCamera {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        vec![device()]
    }

    fn acquire(&self, _constraints: &StreamConstraints) -> BackendResult<MediaStream> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        let track: Arc<dyn MediaTrack> = Arc::new(FakeTrack {
            live: AtomicBool::new(true),
            counter: Arc::clone(&self.live),
        });
        Ok(MediaStream::new(device(), Arc::new(StillFrames), vec![track]))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn device() -> CameraDevice {
    CameraDevice {
        name: "Scripted Rear Camera".into(),
        path: "/dev/scripted0".into(),
        facing: Some(FacingMode::Environment),
        device_info: None,
    }
}

struct FakeTrack {
    live: AtomicBool,
    counter: Arc<AtomicUsize>,
}

impl MediaTrack for FakeTrack {
    fn label(&self) -> &str {
        "scripted-video"
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

struct StillFrames;

impl FrameSource for StillFrames {
    fn latest_frame(&self) -> Option<CameraFrame> {
        Some(CameraFrame::new(2, 2, vec![0u8; 4], PixelFormat::Gray8))
    }
}

/// Detection strategy replaying a fixed script, then `NoMatch` forever
pub struct ScriptedStrategy {
    kind: StrategyKind,
    available: bool,
    script: Mutex<VecDeque<Result<Detection, DetectionError>>>,
    calls: AtomicUsize,
    resets: AtomicUsize,
    /// When set, each attempt waits for a permit before answering
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedStrategy {
    pub fn new(kind: StrategyKind, available: bool) -> Self {
        Self {
            kind,
            available,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn then(self, step: Result<Detection, DetectionError>) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(5)
    }

    async fn detect_once(&self, frames: &dyn FrameSource) -> Result<Detection, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(frames.has_frame());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Detection::NoMatch))
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store that is never reachable
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn upsert_replace(&self, _entity: TableEntity) -> Result<(), InfrastructureError> {
        Err(InfrastructureError::new("connection refused"))
    }

    fn scan<'a>(&'a self, _partition_key: &'a str) -> EntityStream<'a> {
        futures::stream::once(async { Err(InfrastructureError::new("connection refused")) }).boxed()
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Wait until `condition` holds, polling the runtime
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

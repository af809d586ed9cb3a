// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! Camera backends produce frames on a dedicated thread that overwrites a
//! latest-frame slot. [`CaptureLoopController`] owns that thread and
//! [`LoopTrack`] exposes it as a stoppable media track.

use super::types::{CameraFrame, FrameSource, MediaTrack};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Shared slot holding the most recent frame
pub type FrameSlot = Arc<Mutex<Option<CameraFrame>>>;

/// Controller for a capture loop running in a separate thread
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new capture loop in a separate thread
    ///
    /// The provided closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");
            run_loop(&name_clone, &stop_signal_clone, &mut loop_fn);
            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Start a capture loop whose state is created on the loop thread
    ///
    /// Blocks until `init_fn` has run. If it fails the thread exits and the
    /// error is returned to the caller, so device errors surface at
    /// acquisition time rather than on the first frame.
    pub fn start_with_init<S, E, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Result<Self, E>
    where
        S: 'static,
        E: std::fmt::Display + Send + 'static,
        I: FnOnce() -> Result<S, E> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), E>>(1);

        info!(name = %name, "Starting capture loop with initialization");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => {
                    debug!(name = %name_clone, "Initialization successful");
                    let _ = ready_tx.send(Ok(()));
                    s
                }
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Initialization failed");
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            run_loop(&name_clone, &stop_signal_clone, &mut || loop_fn(&mut state));
            info!(name = %name_clone, "Capture loop thread exiting");
        });

        let mut controller = Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(controller),
            Ok(Err(e)) => {
                controller.join();
                Err(e)
            }
            // Init panicked; join logs it and the controller reports not running
            Err(_) => {
                controller.join();
                Ok(controller)
            }
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    ///
    /// Useful if the loop stops itself via `LoopAction::Stop`.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

fn run_loop(name: &str, stop_signal: &AtomicBool, loop_fn: &mut dyn FnMut() -> LoopAction) {
    loop {
        if stop_signal.load(Ordering::SeqCst) {
            debug!(name = %name, "Stop signal received");
            break;
        }

        match loop_fn() {
            LoopAction::Continue => {}
            LoopAction::Stop => {
                debug!(name = %name, "Loop requested stop");
                break;
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

/// Video track fed by a capture loop
///
/// Stopping the track stops and joins the loop thread, which closes the
/// device before `stop` returns.
pub struct LoopTrack {
    label: String,
    slot: FrameSlot,
    controller: Mutex<Option<CaptureLoopController>>,
}

impl LoopTrack {
    pub fn new(label: impl Into<String>, slot: FrameSlot, controller: CaptureLoopController) -> Self {
        Self {
            label: label.into(),
            slot,
            controller: Mutex::new(Some(controller)),
        }
    }
}

impl MediaTrack for LoopTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        let controller = self
            .controller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut controller) = controller {
            info!(track = %self.label, "Stopping video track");
            controller.stop();
            *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
    }

    fn is_live(&self) -> bool {
        self.controller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(CaptureLoopController::is_running)
    }
}

impl FrameSource for LoopTrack {
    fn latest_frame(&self) -> Option<CameraFrame> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_basic_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start("test-loop", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        // Wait for loop to finish itself
        controller.join();

        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::start("test-loop", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            LoopAction::Continue
        });

        thread::sleep(Duration::from_millis(50));

        controller.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_with_init() {
        let result = Arc::new(AtomicU32::new(0));
        let result_clone = Arc::clone(&result);

        let mut controller = CaptureLoopController::start_with_init(
            "test-init-loop",
            || Ok::<_, String>(42u32),
            move |state| {
                result_clone.store(*state, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        controller.join();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_init_failure_is_returned() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let result = CaptureLoopController::start_with_init(
            "test-fail-init",
            || Err::<(), _>("device busy".to_string()),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        assert_eq!(result.err().as_deref(), Some("device busy"));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_loop_track_stop_is_idempotent() {
        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        let controller = CaptureLoopController::start("test-track", move || {
            *writer.lock().unwrap() = Some(CameraFrame::new(1, 1, vec![0u8], PixelFormat::Gray8));
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        });
        let track = LoopTrack::new("test", slot, controller);

        thread::sleep(Duration::from_millis(30));
        assert!(track.is_live());
        assert!(track.has_frame());

        track.stop();
        track.stop();
        assert!(!track.is_live());
        assert!(track.latest_frame().is_none());
    }
}

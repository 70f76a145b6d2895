// SPDX-License-Identifier: GPL-3.0-only
//! Render loop thread management
//!
//! Drives ticks on a dedicated thread at a fixed cadence, standing in for the
//! display-refresh callback a GPU surface owner would provide. State is built
//! on the loop thread itself, so it never has to cross threads (tracking
//! sessions and anchors are owned by the render thread alone).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the tick callback to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep ticking
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a render loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = RenderLoopController::start_with_init(
///     "ar-render",
///     DEFAULT_FRAME_INTERVAL,
///     || build_view(),
///     |view| {
///         view.on_draw_frame(&mut gpu);
///         LoopAction::Continue
///     },
/// );
///
/// // Later
/// controller.stop();
/// ```
pub struct RenderLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl RenderLoopController {
    /// Start a loop calling `tick_fn` once per `interval`
    ///
    /// A tick that overruns the interval is followed immediately by the next
    /// one; missed ticks are not replayed.
    pub fn start<F>(name: &str, interval: Duration, mut tick_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, interval, || Ok(()), move |_: &mut ()| tick_fn())
    }

    /// Start a loop whose state is created on the loop thread
    ///
    /// If `init_fn` fails the thread exits without ticking.
    pub fn start_with_init<S, I, F>(name: &str, interval: Duration, init_fn: I, mut tick_fn: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, interval_us = interval.as_micros() as u64, "Starting render loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Render loop thread started, initializing...");

            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Render loop initialization failed");
                    return;
                }
            };

            let mut ticks: u64 = 0;
            let mut next_deadline = Instant::now();
            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                let action = tick_fn(&mut state);
                ticks += 1;
                if action == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }

                next_deadline += interval;
                let now = Instant::now();
                if next_deadline > now {
                    thread::sleep(next_deadline - now);
                } else {
                    next_deadline = now;
                }
            }

            // State drops here, on the thread that created it
            info!(name = %name_clone, ticks, "Render loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Shared stop flag, e.g. for a Ctrl-C handler
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting render loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Render loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Render loop thread finished");
            }
        }
    }
}

impl Drop for RenderLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "RenderLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

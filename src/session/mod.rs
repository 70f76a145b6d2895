// SPDX-License-Identifier: GPL-3.0-only

//! Tracking session lifecycle
//!
//! ```text
//! Uninitialized ──► Installing ──► Ready ◄──► Suspended
//!        │              │            │            │
//!        └──────────────┴────────────┴────────────┴──► Closed
//! ```
//!
//! Bring-up runs lazily from the render tick: [`SessionLifecycle::ensure_session`]
//! either hands back a ready session or returns `None`, in which case the tick
//! skips all per-frame work. Bring-up failures are logged and retried on the
//! next tick rather than surfaced. A resume that failed is retried the same
//! way, so a suspended session never strands pending requests.

pub mod viewport;

pub use viewport::ViewportTracker;

use crate::backends::{
    DepthMode, FocusMode, InstallStatus, SessionConfig, TrackingRuntime, TrackingSession,
};
use crate::config::Config;
use crate::errors::SessionResult;
use tracing::{debug, error, info, warn};

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Installing,
    Ready,
    Suspended,
    Closed,
}

/// Session bring-up preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPreferences {
    /// Use raw depth when the device supports it
    pub prefer_raw_depth: bool,
    /// Continuous auto-focus
    pub auto_focus: bool,
}

impl Default for SessionPreferences {
    fn default() -> Self {
        Self {
            prefer_raw_depth: true,
            auto_focus: true,
        }
    }
}

impl From<&Config> for SessionPreferences {
    fn from(config: &Config) -> Self {
        Self {
            prefer_raw_depth: config.prefer_raw_depth,
            auto_focus: config.auto_focus,
        }
    }
}

enum Slot<S> {
    Uninitialized,
    Installing,
    Ready(S),
    Suspended(S),
    Closed,
}

/// Owns the tracking runtime and, once brought up, its session
pub struct SessionLifecycle<R: TrackingRuntime> {
    runtime: R,
    slot: Slot<R::Session>,
    preferences: SessionPreferences,
    /// Set once the install prompt has been shown
    install_requested: bool,
    /// Bumped every time a session becomes ready
    generation: u64,
    /// Configuration applied to the current session
    applied: Option<SessionConfig>,
    /// Host asked to resume but the session refused; retried every tick
    resume_pending: bool,
}

impl<R: TrackingRuntime> SessionLifecycle<R> {
    pub fn new(runtime: R, preferences: SessionPreferences) -> Self {
        Self {
            runtime,
            slot: Slot::Uninitialized,
            preferences,
            install_requested: false,
            generation: 0,
            applied: None,
            resume_pending: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.slot {
            Slot::Uninitialized => LifecycleState::Uninitialized,
            Slot::Installing => LifecycleState::Installing,
            Slot::Ready(_) => LifecycleState::Ready,
            Slot::Suspended(_) => LifecycleState::Suspended,
            Slot::Closed => LifecycleState::Closed,
        }
    }

    /// Increments whenever a session (re)enters `Ready`
    ///
    /// The tick driver uses this to re-push display geometry into a session
    /// that has not seen it yet.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Configuration the current session was brought up with
    pub fn applied_config(&self) -> Option<SessionConfig> {
        self.applied
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// True while a failed resume is waiting to be retried
    pub fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// Ready session, bringing it up or resuming it first if needed
    ///
    /// Returns `None` while installing, suspended by the host, closed, or
    /// after a failed bring-up or resume attempt (both retried on the next
    /// call).
    pub fn ensure_session(&mut self) -> Option<&mut R::Session> {
        if self.resume_pending {
            if let Err(e) = self.try_resume() {
                error!(error = %e, "Failed to resume tracking session, retrying next tick");
                return None;
            }
        }

        if matches!(self.slot, Slot::Uninitialized | Slot::Installing) {
            match self.bring_up() {
                Ok(Some(session)) => {
                    self.generation += 1;
                    self.slot = Slot::Ready(session);
                    info!(generation = self.generation, "Tracking session ready");
                }
                Ok(None) => {
                    self.slot = Slot::Installing;
                    return None;
                }
                Err(e) => {
                    error!(error = %e, "Failed to bring up tracking session, retrying next tick");
                    return None;
                }
            }
        }

        match &mut self.slot {
            Slot::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Install check, session creation, capability negotiation, configure, resume
    ///
    /// `Ok(None)` means an install flow is in progress.
    fn bring_up(&mut self) -> SessionResult<Option<R::Session>> {
        let user_requested = !self.install_requested;
        match self.runtime.request_install(user_requested)? {
            InstallStatus::InstallRequested => {
                self.install_requested = true;
                info!("Tracking runtime install requested");
                return Ok(None);
            }
            InstallStatus::Installed => {}
        }

        let mut session = self.runtime.create_session()?;
        let config = self.negotiate(&session);
        debug!(?config, "Configuring tracking session");

        let configured = session
            .configure(&config)
            .and_then(|()| session.resume());
        if let Err(e) = configured {
            // Never keep a half-configured session around
            session.close();
            return Err(e);
        }

        self.applied = Some(config);
        Ok(Some(session))
    }

    /// Pick the best supported settings; support is always queried first
    fn negotiate(&self, session: &R::Session) -> SessionConfig {
        let depth_mode = if self.preferences.prefer_raw_depth
            && session.is_depth_mode_supported(DepthMode::RawDepthOnly)
        {
            DepthMode::RawDepthOnly
        } else {
            if self.preferences.prefer_raw_depth {
                warn!("Raw depth unsupported on this device, depth capture disabled");
            }
            DepthMode::Disabled
        };

        let focus_mode = if self.preferences.auto_focus {
            FocusMode::Auto
        } else {
            FocusMode::Fixed
        };

        SessionConfig {
            depth_mode,
            focus_mode,
        }
    }

    /// Pause a ready session
    pub fn suspend(&mut self) {
        self.resume_pending = false;
        self.slot = match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Ready(mut session) => {
                session.pause();
                info!("Tracking session suspended");
                Slot::Suspended(session)
            }
            other => other,
        };
    }

    /// Resume a suspended session
    ///
    /// On failure it stays suspended and [`Self::ensure_session`] keeps
    /// retrying the resume until it succeeds or the host pauses again.
    pub fn resume(&mut self) -> SessionResult<()> {
        if !matches!(self.slot, Slot::Suspended(_)) {
            return Ok(());
        }
        self.resume_pending = true;
        self.try_resume()
    }

    fn try_resume(&mut self) -> SessionResult<()> {
        if let Slot::Suspended(session) = &mut self.slot {
            session.resume()?;
        } else {
            return Ok(());
        }

        self.slot = match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Suspended(session) => {
                self.resume_pending = false;
                self.generation += 1;
                info!(generation = self.generation, "Tracking session resumed");
                Slot::Ready(session)
            }
            other => other,
        };
        Ok(())
    }

    /// Tear down; every later call is a no-op
    ///
    /// Must not run while a tick is using the session, which the `&mut self`
    /// receiver guarantees.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Ready(mut session) | Slot::Suspended(mut session) => {
                session.close();
                info!("Tracking session closed");
            }
            _ => debug!("Lifecycle closed without a session"),
        }
        self.applied = None;
        self.resume_pending = false;
    }
}

impl<R: TrackingRuntime> Drop for SessionLifecycle<R> {
    fn drop(&mut self) {
        if matches!(self.slot, Slot::Ready(_) | Slot::Suspended(_)) {
            self.close();
        }
    }
}

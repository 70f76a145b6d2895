// SPDX-License-Identifier: GPL-3.0-only

//! Deferred display-geometry reconciliation
//!
//! Surface-size and rotation changes arrive on whatever thread the platform
//! delivers them on. They are only recorded here; the render tick pushes the
//! latest geometry into the session once, the next time it runs.

use crate::backends::{DisplayRotation, TrackingSession};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Default)]
struct ViewportState {
    width: u32,
    height: u32,
    rotation: DisplayRotation,
    dirty: bool,
}

/// Shared viewport geometry with a dirty flag
///
/// Clones share the same state, so the notification side and the render
/// thread can each hold one.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    state: Arc<Mutex<ViewportState>>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new surface size
    pub fn on_surface_changed(&self, width: u32, height: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.width = width;
            state.height = height;
            state.dirty = true;
        }
    }

    /// Record a new display rotation
    pub fn on_display_changed(&self, rotation: DisplayRotation) {
        if let Ok(mut state) = self.state.lock() {
            state.rotation = rotation;
            state.dirty = true;
        }
    }

    /// Push the latest geometry into `session` if anything changed
    ///
    /// Returns whether a push happened. The read and the flag reset happen
    /// under one lock, so a change racing with this call is either included
    /// or left dirty for the next tick.
    pub fn apply_if_dirty(&self, session: &mut dyn TrackingSession) -> bool {
        let (rotation, width, height) = match self.state.lock() {
            Ok(mut state) if state.dirty => {
                state.dirty = false;
                (state.rotation, state.width, state.height)
            }
            _ => return false,
        };

        debug!(%rotation, width, height, "Applying display geometry");
        session.set_display_geometry(rotation, width, height);
        true
    }

    /// Mark dirty without changing the geometry (e.g. after a session restart)
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.dirty = true;
        }
    }

    /// Last recorded surface size
    pub fn size(&self) -> (u32, u32) {
        self.state
            .lock()
            .map(|state| (state.width, state.height))
            .unwrap_or((0, 0))
    }

    pub fn rotation(&self) -> DisplayRotation {
        self.state
            .lock()
            .map(|state| state.rotation)
            .unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().map(|state| state.dirty).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{DepthMode, SessionConfig, TrackedFrame};
    use crate::errors::{SessionError, SessionResult};
    use crate::gpu::TextureId;

    #[derive(Default)]
    struct GeometrySink {
        pushes: Vec<(DisplayRotation, u32, u32)>,
    }

    impl TrackingSession for GeometrySink {
        fn is_depth_mode_supported(&self, _mode: DepthMode) -> bool {
            false
        }
        fn configure(&mut self, _config: &SessionConfig) -> SessionResult<()> {
            Ok(())
        }
        fn resume(&mut self) -> SessionResult<()> {
            Ok(())
        }
        fn pause(&mut self) {}
        fn close(&mut self) {}
        fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
            self.pushes.push((rotation, width, height));
        }
        fn set_camera_texture(&mut self, _texture: TextureId) {}
        fn update(&mut self) -> SessionResult<Box<dyn TrackedFrame + '_>> {
            Err(SessionError::Paused)
        }
    }

    #[test]
    fn test_many_changes_one_push_with_latest_values() {
        let tracker = ViewportTracker::new();
        let mut session = GeometrySink::default();

        tracker.on_surface_changed(640, 480);
        tracker.on_display_changed(DisplayRotation::Rotate90);
        tracker.on_surface_changed(1080, 1920);
        tracker.on_display_changed(DisplayRotation::Rotate270);

        assert!(tracker.apply_if_dirty(&mut session));
        assert!(!tracker.apply_if_dirty(&mut session));
        assert!(!tracker.apply_if_dirty(&mut session));

        assert_eq!(session.pushes, vec![(DisplayRotation::Rotate270, 1080, 1920)]);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_clean_tracker_does_nothing() {
        let tracker = ViewportTracker::new();
        let mut session = GeometrySink::default();
        assert!(!tracker.apply_if_dirty(&mut session));
        assert!(session.pushes.is_empty());
    }

    #[test]
    fn test_clones_share_state_across_threads() {
        let tracker = ViewportTracker::new();
        let notifier = tracker.clone();

        std::thread::spawn(move || {
            for i in 1..=100 {
                notifier.on_surface_changed(i, i * 2);
            }
        })
        .join()
        .unwrap();

        let mut session = GeometrySink::default();
        assert!(tracker.apply_if_dirty(&mut session));
        assert_eq!(session.pushes, vec![(DisplayRotation::Rotate0, 100, 200)]);
        assert_eq!(tracker.size(), (100, 200));
    }

    #[test]
    fn test_invalidate_repushes_same_geometry() {
        let tracker = ViewportTracker::new();
        let mut session = GeometrySink::default();
        tracker.on_surface_changed(800, 600);
        tracker.apply_if_dirty(&mut session);
        tracker.invalidate();
        tracker.apply_if_dirty(&mut session);
        assert_eq!(session.pushes.len(), 2);
        assert_eq!(session.pushes[0], session.pushes[1]);
    }
}

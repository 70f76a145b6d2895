// SPDX-License-Identifier: GPL-3.0-only

//! Pending-request slots shared between the request channel and the render loop
//!
//! Each request kind has one slot. The channel side records intent and gets a
//! receiver back without blocking; the render loop checks the slot once per
//! tick, takes every waiting reply handle, and resolves them all with the
//! result of that single tick. Requests arriving while one is already pending
//! join it rather than overwrite it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::dispatch::ResponseContext;

const IDLE: u8 = 0;
const REQUESTED: u8 = 1;
const PROCESSING: u8 = 2;
const CLOSED: u8 = 3;

/// Observable slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Requested,
    Processing,
    Closed,
}

/// Single-use reply handle
#[derive(Debug)]
pub struct Reply<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Reply<T> {
    /// Deliver the response; consumes the handle so it cannot answer twice
    pub fn send(self, value: T) {
        if self.sender.send(value).is_err() {
            debug!("Requester went away before the reply arrived");
        }
    }
}

/// Reply handles taken from a slot by one tick
#[derive(Debug)]
pub struct Batch<T> {
    replies: Vec<Reply<T>>,
}

impl<T: Clone + Send + 'static> Batch<T> {
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Hand the result to the response context, which answers every waiter
    pub fn resolve(self, context: &dyn ResponseContext, value: T) {
        let replies = self.replies;
        context.dispatch(Box::new(move || {
            for reply in replies {
                reply.send(value.clone());
            }
        }));
    }
}

/// One request kind's pending state
#[derive(Debug)]
pub struct RequestSlot<T> {
    name: &'static str,
    state: AtomicU8,
    waiters: Mutex<Vec<Reply<T>>>,
}

impl<T: Clone + Send + 'static> RequestSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(IDLE),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            IDLE => SlotState::Idle,
            REQUESTED => SlotState::Requested,
            PROCESSING => SlotState::Processing,
            _ => SlotState::Closed,
        }
    }

    /// Record a request; never blocks on the render loop
    ///
    /// On a closed slot the returned receiver resolves immediately with a
    /// receive error.
    pub fn request(&self) -> oneshot::Receiver<T> {
        let (sender, receiver) = oneshot::channel();
        let Ok(mut waiters) = self.waiters.lock() else {
            warn!(slot = self.name, "Request slot poisoned, dropping request");
            return receiver;
        };

        match self.state.load(Ordering::Acquire) {
            CLOSED => {
                debug!(slot = self.name, "Request after shutdown");
                return receiver;
            }
            IDLE => self.state.store(REQUESTED, Ordering::Release),
            // already requested, or the in-flight tick will re-flag on finish
            _ => {}
        }
        waiters.push(Reply { sender });
        debug!(slot = self.name, pending = waiters.len(), "Request recorded");
        receiver
    }

    /// Cheap per-tick check
    pub fn is_requested(&self) -> bool {
        self.state.load(Ordering::Acquire) == REQUESTED
    }

    /// Take every waiting reply and move to `Processing`
    ///
    /// Returns `None` unless the slot is `Requested`.
    pub fn begin(&self) -> Option<Batch<T>> {
        if !self.is_requested() {
            return None;
        }
        let mut waiters = self.waiters.lock().ok()?;
        if self
            .state
            .compare_exchange(REQUESTED, PROCESSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        Some(Batch {
            replies: std::mem::take(&mut *waiters),
        })
    }

    /// Leave `Processing`; requests that arrived meanwhile keep it flagged
    pub fn finish(&self) {
        let Ok(waiters) = self.waiters.lock() else {
            return;
        };
        let next = if waiters.is_empty() { IDLE } else { REQUESTED };
        let _ = self
            .state
            .compare_exchange(PROCESSING, next, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Close the slot and hand back everything still waiting
    pub fn close(&self) -> Batch<T> {
        let replies = match self.waiters.lock() {
            Ok(mut waiters) => {
                self.state.store(CLOSED, Ordering::Release);
                std::mem::take(&mut *waiters)
            }
            Err(_) => {
                self.state.store(CLOSED, Ordering::Release);
                Vec::new()
            }
        };
        Batch { replies }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dispatch::ImmediateContext;

    #[test]
    fn test_state_machine() {
        let slot: RequestSlot<bool> = RequestSlot::new("test");
        assert_eq!(slot.state(), SlotState::Idle);
        assert!(slot.begin().is_none());

        let mut rx = slot.request();
        assert_eq!(slot.state(), SlotState::Requested);

        let batch = slot.begin().unwrap();
        assert_eq!(slot.state(), SlotState::Processing);
        assert!(slot.begin().is_none());

        batch.resolve(&ImmediateContext, true);
        slot.finish();
        assert_eq!(slot.state(), SlotState::Idle);
        assert_eq!(rx.try_recv(), Ok(true));
    }

    #[test]
    fn test_concurrent_requests_coalesce() {
        let slot: RequestSlot<u32> = RequestSlot::new("test");
        let mut first = slot.request();
        let mut second = slot.request();

        let batch = slot.begin().unwrap();
        assert_eq!(batch.len(), 2);
        batch.resolve(&ImmediateContext, 7);
        slot.finish();

        assert_eq!(first.try_recv(), Ok(7));
        assert_eq!(second.try_recv(), Ok(7));
    }

    #[test]
    fn test_request_during_processing_waits_for_next_tick() {
        let slot: RequestSlot<u32> = RequestSlot::new("test");
        let mut early = slot.request();
        let batch = slot.begin().unwrap();

        let mut late = slot.request();
        batch.resolve(&ImmediateContext, 1);
        slot.finish();

        assert_eq!(early.try_recv(), Ok(1));
        assert!(late.try_recv().is_err());
        assert_eq!(slot.state(), SlotState::Requested);

        let batch = slot.begin().unwrap();
        batch.resolve(&ImmediateContext, 2);
        slot.finish();
        assert_eq!(late.try_recv(), Ok(2));
    }

    #[test]
    fn test_close_returns_waiters_and_rejects_new_requests() {
        let slot: RequestSlot<bool> = RequestSlot::new("test");
        let mut pending = slot.request();

        let batch = slot.close();
        assert_eq!(batch.len(), 1);
        batch.resolve(&ImmediateContext, false);
        assert_eq!(pending.try_recv(), Ok(false));

        let mut after = slot.request();
        assert_eq!(slot.state(), SlotState::Closed);
        assert!(matches!(
            after.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}

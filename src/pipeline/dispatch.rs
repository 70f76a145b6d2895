// SPDX-License-Identifier: GPL-3.0-only

//! Response execution contexts
//!
//! Replies are computed on the render thread but must be delivered on the
//! context the request channel lives on. Delivery is an explicit step.

use tokio::runtime::Handle;
use tracing::trace;

/// Task carrying the replies of one serviced request
pub type ResponseTask = Box<dyn FnOnce() + Send + 'static>;

/// Where replies are delivered
pub trait ResponseContext: Send + Sync {
    fn dispatch(&self, task: ResponseTask);
}

/// Delivers replies on a tokio runtime
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context for the runtime the caller is running on
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl ResponseContext for RuntimeContext {
    fn dispatch(&self, task: ResponseTask) {
        trace!("Dispatching response to runtime");
        self.handle.spawn(async move { task() });
    }
}

/// Runs the task on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateContext;

impl ResponseContext for ImmediateContext {
    fn dispatch(&self, task: ResponseTask) {
        task();
    }
}

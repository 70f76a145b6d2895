// SPDX-License-Identifier: GPL-3.0-only

//! Method-call channel facing the application shell
//!
//! Every call records intent in the matching request slot and immediately
//! returns a future; the render loop resolves it on a later tick.

use super::{CaptureResult, Requests};
use crate::constants::methods;
use crate::errors::CaptureError;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reply to a method call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    Success { value: Value },
    Error { code: String, message: String },
    NotImplemented,
}

/// Cloneable handle the request side holds
#[derive(Clone)]
pub struct ArChannel {
    requests: Arc<Requests>,
}

impl ArChannel {
    pub(crate) fn new(requests: Arc<Requests>) -> Self {
        Self { requests }
    }

    /// Ask for an anchor at the viewport center
    ///
    /// Resolves to `false` when no qualifying surface was hit, or when the
    /// view was disposed first.
    pub fn place_anchor(&self) -> impl Future<Output = bool> + Send + 'static {
        let receiver = self.requests.anchor.request();
        async move { receiver.await.unwrap_or(false) }
    }

    /// Ask for a synchronized color + depth + pose capture
    pub fn capture_frame(
        &self,
    ) -> impl Future<Output = Result<CaptureResult, CaptureError>> + Send + 'static {
        let receiver = self.requests.capture.request();
        async move { receiver.await.unwrap_or(Err(CaptureError::Disposed)) }
    }

    /// Dispatch a call by method name
    pub async fn handle_method_call(&self, method: &str) -> MethodResponse {
        debug!(method, "Method call");
        match method {
            methods::PLACE_ANCHOR => MethodResponse::Success {
                value: Value::Bool(self.place_anchor().await),
            },
            methods::CAPTURE_FRAME => match self.capture_frame().await {
                Ok(result) => match serde_json::to_value(&result) {
                    Ok(value) => MethodResponse::Success { value },
                    Err(e) => MethodResponse::Error {
                        code: CaptureError::Encoding(String::new()).code().to_string(),
                        message: e.to_string(),
                    },
                },
                Err(e) => {
                    warn!(error = %e, "Capture failed");
                    MethodResponse::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    }
                }
            },
            other => {
                debug!(method = other, "Unknown method");
                MethodResponse::NotImplemented
            }
        }
    }
}

impl std::fmt::Debug for ArChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArChannel")
            .field("anchor", &self.requests.anchor.state())
            .field("capture", &self.requests.capture.state())
            .finish()
    }
}

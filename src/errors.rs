// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the AR capture bridge

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for tracking-engine operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for rasterizer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Tracking session errors
    Session(SessionError),
    /// Capture errors
    Capture(CaptureError),
    /// GPU / rendering errors
    Render(RenderError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Point cloud reconstruction or export errors
    Export(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised by the tracking engine or while bringing a session up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The tracking runtime is not installed and cannot be installed
    RuntimeUnavailable(String),
    /// Session creation failed
    CreationFailed(String),
    /// The requested configuration was rejected
    ConfigurationFailed(String),
    /// The camera could not be opened (e.g. in use by another app)
    CameraNotAvailable,
    /// The requested resource is not available for this frame yet
    NotYetAvailable(String),
    /// A required capability is unsupported on this device
    Unsupported(String),
    /// The session has been paused
    Paused,
    /// The session has been closed
    Closed,
}

/// Capture errors reported back to the requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Color or depth image could not be acquired from the frame
    ImageAcquisition(String),
    /// Planar to interleaved conversion failed
    Conversion(String),
    /// JPEG encoding failed
    Encoding(String),
    /// Writing an artifact failed
    Io(String),
    /// The view was disposed before the capture could run
    Disposed,
}

impl CaptureError {
    /// Error code carried in the method-channel failure reply
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Disposed => "DISPOSED",
            _ => "CAPTURE_FAILED",
        }
    }
}

/// Rendering errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Shader failed to parse or validate
    ShaderCompilation { label: String, message: String },
    /// Vertex attribute name not found in the program
    MissingAttribute(String),
    /// Uniform name not found in the program
    MissingUniform(String),
    /// A handle that this rasterizer never issued
    InvalidHandle(&'static str),
    /// Draw attempted before GPU resources were created
    NotInitialized,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Render(e) => write!(f, "Render error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Export(msg) => write!(f, "Export error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RuntimeUnavailable(msg) => {
                write!(f, "Tracking runtime unavailable: {}", msg)
            }
            SessionError::CreationFailed(msg) => write!(f, "Session creation failed: {}", msg),
            SessionError::ConfigurationFailed(msg) => {
                write!(f, "Session configuration failed: {}", msg)
            }
            SessionError::CameraNotAvailable => write!(f, "Camera not available"),
            SessionError::NotYetAvailable(what) => write!(f, "{} not yet available", what),
            SessionError::Unsupported(what) => write!(f, "Unsupported: {}", what),
            SessionError::Paused => write!(f, "Session is paused"),
            SessionError::Closed => write!(f, "Session is closed"),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ImageAcquisition(msg) => write!(f, "Image acquisition failed: {}", msg),
            CaptureError::Conversion(msg) => write!(f, "Format conversion failed: {}", msg),
            CaptureError::Encoding(msg) => write!(f, "Encoding failed: {}", msg),
            CaptureError::Io(msg) => write!(f, "Write failed: {}", msg),
            CaptureError::Disposed => write!(f, "View disposed before capture"),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ShaderCompilation { label, message } => {
                write!(f, "Shader '{}' failed to compile: {}", label, message)
            }
            RenderError::MissingAttribute(name) => write!(f, "Missing vertex attribute: {}", name),
            RenderError::MissingUniform(name) => write!(f, "Missing uniform: {}", name),
            RenderError::InvalidHandle(kind) => write!(f, "Invalid {} handle", kind),
            RenderError::NotInitialized => write!(f, "GPU resources not created"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SessionError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RenderError {}

// Conversions from sub-errors to AppError
impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<SessionError> for CaptureError {
    fn from(err: SessionError) -> Self {
        CaptureError::ImageAcquisition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_codes() {
        assert_eq!(CaptureError::Io("disk full".into()).code(), "CAPTURE_FAILED");
        assert_eq!(CaptureError::Disposed.code(), "DISPOSED");
    }

    #[test]
    fn test_session_error_wraps_into_capture_error() {
        let err: CaptureError = SessionError::NotYetAvailable("Depth image".into()).into();
        assert_eq!(
            err,
            CaptureError::ImageAcquisition("Depth image not yet available".into())
        );
    }
}

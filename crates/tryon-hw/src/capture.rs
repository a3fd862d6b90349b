//! Capture-device seam driven by the tracking session.
//!
//! A provider hands out a streaming [`FrameSource`] on `acquire` and takes it
//! back on `release`. Calls are blocking; the session runs them on its own
//! thread.

use crate::frame::Frame;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera permission denied for {0}")]
    PermissionDenied(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("release failed: {0}")]
    ReleaseFailed(String),
}

/// Requested capture geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// An acquired, streaming capture device.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, DeviceError>;
}

/// Hands out capture streams.
pub trait CaptureProvider: Send + 'static {
    type Stream: FrameSource;

    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<Self::Stream, DeviceError>;

    fn release(&mut self, stream: Self::Stream) -> Result<(), DeviceError>;
}

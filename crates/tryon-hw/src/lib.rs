//! tryon-hw — Camera capture for the try-on overlay.
//!
//! Defines the capture-device seam the tracking session drives and a
//! V4L2 implementation of it. Frames are handed on as packed RGB24.

pub mod camera;
pub mod capture;
pub mod frame;

pub use camera::{Camera, CameraProvider, DeviceInfo, PixelFormat};
pub use capture::{CaptureConstraints, CaptureProvider, DeviceError, FrameSource};
pub use frame::Frame;

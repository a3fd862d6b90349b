//! tryon-overlay — Real-time face-anchored accessory overlay.
//!
//! A [`TrackingSession`] owns the camera and the landmark detector on its
//! own thread and publishes the latest detection into a
//! [`LandmarkRegister`]. The [`Compositor`] renders the selected accessory
//! from that register at display cadence, and the
//! [`AROverlayController`] ties both to variant selection and the user's
//! manual adjustments.

pub mod compositor;
pub mod config;
pub mod controller;
pub mod detector;
pub mod register;
pub mod replay;
pub mod session;

#[cfg(test)]
mod testing;

pub use compositor::{Compositor, FramePlan, ModelRenderer, OverlayState};
pub use config::OverlayConfig;
pub use controller::{AROverlayController, ControllerSettings, OverlayError};
pub use detector::{DetectorError, DetectorOptions, LandmarkDetector};
pub use register::{Detection, DetectionSink, LandmarkRegister};
pub use replay::ReplayDetector;
pub use session::{SessionError, SessionSettings, SessionState, TrackingSession};

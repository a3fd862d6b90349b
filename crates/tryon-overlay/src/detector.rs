//! Landmark detector seam.
//!
//! The detector itself (model, inference) is external. The session
//! initialises it once per activation, forwards every captured frame to
//! [`LandmarkDetector::submit`], and expects results to come back through
//! the [`DetectionSink`] registered at initialisation, possibly from another
//! thread and possibly after a delay.

use crate::register::DetectionSink;
use thiserror::Error;
use tryon_hw::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("detector initialization failed: {0}")]
    InitFailed(String),
    #[error("frame submission failed: {0}")]
    SubmitFailed(String),
    #[error("detector is closed")]
    Closed,
    #[error("detector release failed: {0}")]
    CloseFailed(String),
}

/// Fixed detector configuration for single-face try-on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    pub max_faces: usize,
    /// Request the refined landmark set (iris points included).
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl DetectorOptions {
    pub fn single_face(min_detection_confidence: f32, min_tracking_confidence: f32) -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence,
            min_tracking_confidence,
        }
    }
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::single_face(0.5, 0.5)
    }
}

pub trait LandmarkDetector: Send + 'static {
    /// Load the model with `options` and register `sink` for results.
    fn initialize(&mut self, options: &DetectorOptions, sink: DetectionSink) -> Result<(), DetectorError>;

    /// Queue a frame for detection. Must not block on the result.
    fn submit(&mut self, frame: &Frame) -> Result<(), DetectorError>;

    /// Release detector resources. The sink must not be used afterwards.
    fn close(&mut self) -> Result<(), DetectorError>;
}

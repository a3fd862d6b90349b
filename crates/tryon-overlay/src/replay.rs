//! Detector that replays recorded landmark sets.
//!
//! A recording is JSON lines: each line is either an array of
//! `{"x": .., "y": .., "z": ..}` points (one face) or `null` (no face).
//! Every submitted frame publishes the next entry, wrapping around at the
//! end, so a short recording drives an arbitrarily long session.

use crate::detector::{DetectorError, DetectorOptions, LandmarkDetector};
use crate::register::DetectionSink;
use std::path::Path;
use tryon_core::LandmarkSet;
use tryon_hw::Frame;

pub struct ReplayDetector {
    recording: Vec<Option<LandmarkSet>>,
    cursor: usize,
    sink: Option<DetectionSink>,
}

impl ReplayDetector {
    pub fn new(recording: Vec<Option<LandmarkSet>>) -> Self {
        Self {
            recording,
            cursor: 0,
            sink: None,
        }
    }

    /// Parse a JSON-lines recording. Blank lines are skipped.
    pub fn from_json_lines(src: &str) -> Result<Self, DetectorError> {
        let mut recording = Vec::new();
        for (n, line) in src.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: Option<LandmarkSet> = serde_json::from_str(line)
                .map_err(|e| DetectorError::InitFailed(format!("recording line {}: {e}", n + 1)))?;
            recording.push(entry);
        }
        Ok(Self::new(recording))
    }

    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| DetectorError::ModelNotFound(format!("{}: {e}", path.display())))?;
        let detector = Self::from_json_lines(&src)?;
        tracing::info!(
            path = %path.display(),
            entries = detector.recording.len(),
            "loaded landmark recording"
        );
        Ok(detector)
    }

    pub fn len(&self) -> usize {
        self.recording.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recording.is_empty()
    }
}

impl LandmarkDetector for ReplayDetector {
    fn initialize(&mut self, options: &DetectorOptions, sink: DetectionSink) -> Result<(), DetectorError> {
        tracing::debug!(
            max_faces = options.max_faces,
            entries = self.recording.len(),
            "replay detector initialized"
        );
        self.cursor = 0;
        self.sink = Some(sink);
        Ok(())
    }

    fn submit(&mut self, _frame: &Frame) -> Result<(), DetectorError> {
        let sink = self.sink.as_ref().ok_or(DetectorError::Closed)?;
        if self.recording.is_empty() {
            sink.publish(None);
            return Ok(());
        }
        let entry = self.recording[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.recording.len();
        sink.publish(entry);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DetectorError> {
        self.sink = None;
        Ok(())
    }
}

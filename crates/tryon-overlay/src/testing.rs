//! Fake capture provider, detector and renderer for session and controller
//! tests. All of them report into a shared [`Probe`].

use crate::compositor::ModelRenderer;
use crate::detector::{DetectorError, DetectorOptions, LandmarkDetector};
use crate::register::DetectionSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tryon_core::{mesh, Landmark, LandmarkSet, RenderTransform};
use tryon_hw::{CaptureConstraints, CaptureProvider, DeviceError, Frame, FrameSource};

/// A refined landmark set with both outer eye corners at `(x ± 0.1, y)`
/// and everything else at `(x, y)`.
pub fn face_at(x: f32, y: f32) -> LandmarkSet {
    let mut points = vec![Landmark::new(x, y); mesh::REFINED_LANDMARK_COUNT];
    points[mesh::LEFT_EYE_OUTER] = Landmark::new(x - 0.1, y);
    points[mesh::RIGHT_EYE_OUTER] = Landmark::new(x + 0.1, y);
    LandmarkSet::new(points)
}

#[derive(Clone, Default)]
pub struct Probe {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    initialized: Arc<AtomicUsize>,
    submitted: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    sinks: Arc<Mutex<Vec<DetectionSink>>>,
    draws: Arc<Mutex<Vec<(String, RenderTransform)>>>,
}

impl Probe {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
    pub fn last_sink(&self) -> Option<DetectionSink> {
        self.sinks.lock().unwrap().last().cloned()
    }
    pub fn draws(&self) -> Vec<(String, RenderTransform)> {
        self.draws.lock().unwrap().clone()
    }
}

pub struct FakeProvider {
    probe: Probe,
    acquire_delay: Duration,
    fail_with: Option<DeviceError>,
    fail_first: Option<DeviceError>,
    fail_release: bool,
    frames_before_error: Option<usize>,
}

impl FakeProvider {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            acquire_delay: Duration::ZERO,
            fail_with: None,
            fail_first: None,
            fail_release: false,
            frames_before_error: None,
        }
    }

    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Every acquisition fails with `err`.
    pub fn failing_with(mut self, err: DeviceError) -> Self {
        self.fail_with = Some(err);
        self
    }

    /// Only the first acquisition fails with `err`.
    pub fn failing_first(mut self, err: DeviceError) -> Self {
        self.fail_first = Some(err);
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn stream_fails_after(mut self, frames: usize) -> Self {
        self.frames_before_error = Some(frames);
        self
    }
}

pub struct FakeStream {
    sequence: u32,
    fail_after: Option<usize>,
}

impl FrameSource for FakeStream {
    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        if self.fail_after.is_some_and(|n| self.sequence as usize >= n) {
            return Err(DeviceError::CaptureFailed("unplugged".into()));
        }
        std::thread::sleep(Duration::from_millis(2));
        self.sequence += 1;
        Ok(Frame {
            data: vec![0; Frame::rgb_len(4, 4)],
            width: 4,
            height: 4,
            timestamp: std::time::Instant::now(),
            sequence: self.sequence,
        })
    }
}

impl CaptureProvider for FakeProvider {
    type Stream = FakeStream;

    fn acquire(&mut self, _constraints: &CaptureConstraints) -> Result<FakeStream, DeviceError> {
        std::thread::sleep(self.acquire_delay);
        if let Some(err) = self.fail_first.take().or_else(|| self.fail_with.clone()) {
            return Err(err);
        }
        self.probe.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStream {
            sequence: 0,
            fail_after: self.frames_before_error,
        })
    }

    fn release(&mut self, _stream: FakeStream) -> Result<(), DeviceError> {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(DeviceError::ReleaseFailed("stuck".into()));
        }
        Ok(())
    }
}

pub struct FakeDetector {
    probe: Probe,
    init_delay: Duration,
    fail_init: bool,
    fail_close: bool,
}

impl FakeDetector {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            init_delay: Duration::ZERO,
            fail_init: false,
            fail_close: false,
        }
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl LandmarkDetector for FakeDetector {
    fn initialize(&mut self, _options: &DetectorOptions, sink: DetectionSink) -> Result<(), DetectorError> {
        std::thread::sleep(self.init_delay);
        if self.fail_init {
            return Err(DetectorError::InitFailed("model missing".into()));
        }
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        self.probe.sinks.lock().unwrap().push(sink);
        Ok(())
    }

    fn submit(&mut self, _frame: &Frame) -> Result<(), DetectorError> {
        self.probe.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DetectorError> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DetectorError::CloseFailed("wedged".into()));
        }
        Ok(())
    }
}

pub struct RecordingRenderer {
    probe: Probe,
}

impl RecordingRenderer {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
        }
    }
}

impl ModelRenderer for RecordingRenderer {
    fn draw(&mut self, model: &str, transform: &RenderTransform) {
        self.probe
            .draws
            .lock()
            .unwrap()
            .push((model.to_string(), *transform));
    }
}

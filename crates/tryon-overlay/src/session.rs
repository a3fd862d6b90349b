//! Tracking session: capture device + landmark detector lifecycle.
//!
//! The session runs on a dedicated OS thread that owns both resources. The
//! [`TrackingSession`] handle talks to it over a request queue, so `open`
//! and `close` are serialised in call order. While running, the thread
//! pulls frames from the capture stream and submits them to the detector;
//! results land in the session's [`LandmarkRegister`].
//!
//! Every exit path (explicit close, capture failure, dropping the handle)
//! goes through one teardown routine that attempts to release the capture
//! stream and close the detector independently.

use crate::detector::{DetectorError, DetectorOptions, LandmarkDetector};
use crate::register::LandmarkRegister;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tryon_hw::{CaptureConstraints, CaptureProvider, DeviceError, FrameSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    Device(#[from] DeviceError),
    #[error("landmark detector unavailable: {0}")]
    Detector(#[from] DetectorError),
    #[error("session closed while starting")]
    Cancelled,
    #[error("session thread exited")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(String),
}

/// Capture and detector configuration applied on every `open`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionSettings {
    pub constraints: CaptureConstraints,
    pub detector: DetectorOptions,
}

enum SessionRequest {
    Open {
        /// Register epoch observed when `open` was called.
        epoch: u64,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a tracking session thread.
///
/// Dropping the handle tears the session down.
pub struct TrackingSession {
    tx: mpsc::UnboundedSender<SessionRequest>,
    state: watch::Receiver<SessionState>,
    register: LandmarkRegister,
}

impl TrackingSession {
    /// Spawn the session thread in the `Idle` state. Nothing is acquired
    /// until [`open`](Self::open).
    pub fn spawn<P, D>(provider: P, detector: D, settings: SessionSettings) -> Self
    where
        P: CaptureProvider,
        D: LandmarkDetector,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let register = LandmarkRegister::new();

        let worker = SessionWorker {
            provider,
            detector,
            settings,
            register: register.clone(),
            state: state_tx,
            stream: None,
            detector_live: false,
        };

        std::thread::Builder::new()
            .name("tryon-session".into())
            .spawn(move || worker.run(rx))
            .expect("failed to spawn session thread");

        Self {
            tx,
            state: state_rx,
            register,
        }
    }

    /// Acquire the camera and start the detector.
    ///
    /// The request is queued immediately; the returned future resolves once
    /// the session is `Running` or has failed. Opening a running session is
    /// a no-op. If [`close`](Self::close) is called before startup finishes,
    /// everything acquired is released and this resolves to
    /// [`SessionError::Cancelled`].
    pub fn open(&self) -> impl Future<Output = Result<(), SessionError>> + Send + 'static {
        let (reply, reply_rx) = oneshot::channel();
        let sent = self
            .tx
            .send(SessionRequest::Open {
                epoch: self.register.epoch(),
                reply,
            })
            .is_ok();
        async move {
            if !sent {
                return Err(SessionError::ChannelClosed);
            }
            reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
        }
    }

    /// Stop detection and release the camera and detector.
    ///
    /// Detection results stop being accepted as soon as this is called. The
    /// returned future only reports teardown completion; it may be dropped.
    /// Closing an idle or stopped session is a no-op.
    pub fn close(&self) -> impl Future<Output = ()> + Send + 'static {
        self.register.revoke();
        let (reply, reply_rx) = oneshot::channel();
        let sent = self.tx.send(SessionRequest::Close { reply }).is_ok();
        async move {
            if sent {
                let _ = reply_rx.await;
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Register holding the latest detection of the current activation.
    pub fn register(&self) -> &LandmarkRegister {
        &self.register
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        // The worker sees the closed queue and runs teardown; a queued
        // `Open` is refused activation.
        self.register.revoke();
    }
}

struct SessionWorker<P: CaptureProvider, D: LandmarkDetector> {
    provider: P,
    detector: D,
    settings: SessionSettings,
    register: LandmarkRegister,
    state: watch::Sender<SessionState>,
    /// Present exactly while the capture device is held.
    stream: Option<P::Stream>,
    /// True between a successful `initialize` and `close` of the detector.
    detector_live: bool,
}

impl<P: CaptureProvider, D: LandmarkDetector> SessionWorker<P, D> {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionRequest>) {
        tracing::debug!("session thread started");
        loop {
            let request = if self.stream.is_some() {
                match rx.try_recv() {
                    Ok(req) => Some(req),
                    Err(TryRecvError::Empty) => {
                        self.pump_frame();
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => None,
                }
            } else {
                rx.blocking_recv()
            };

            match request {
                Some(SessionRequest::Open { epoch, reply }) => {
                    let result = self.open(epoch);
                    let _ = reply.send(result);
                }
                Some(SessionRequest::Close { reply }) => {
                    self.close();
                    let _ = reply.send(());
                }
                None => {
                    self.close();
                    break;
                }
            }
        }
        tracing::debug!("session thread exiting");
    }

    fn open(&mut self, epoch: u64) -> Result<(), SessionError> {
        let current = self.state.borrow().clone();
        if current == SessionState::Running {
            return Ok(());
        }

        self.set_state(SessionState::Starting);

        let stream = match self.provider.acquire(&self.settings.constraints) {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.stream = Some(stream);
        tracing::info!(
            width = self.settings.constraints.width,
            height = self.settings.constraints.height,
            "capture device acquired"
        );

        let sink = self.register.sink();
        if let Err(e) = self.detector.initialize(&self.settings.detector, sink.clone()) {
            self.teardown();
            return Err(self.fail(e.into()));
        }
        self.detector_live = true;
        tracing::info!(options = ?self.settings.detector, "landmark detector initialized");

        if !self.register.activate(&sink, epoch) {
            tracing::info!("session closed while starting; releasing resources");
            self.set_state(SessionState::Stopping);
            self.teardown();
            self.set_state(SessionState::Stopped);
            return Err(SessionError::Cancelled);
        }

        self.set_state(SessionState::Running);
        Ok(())
    }

    fn close(&mut self) {
        let current = self.state.borrow().clone();
        if matches!(current, SessionState::Idle | SessionState::Stopped) {
            tracing::trace!(state = ?current, "close on inactive session ignored");
            return;
        }
        self.register.seal();
        self.set_state(SessionState::Stopping);
        self.teardown();
        self.set_state(SessionState::Stopped);
        tracing::info!("session stopped");
    }

    /// Forward one captured frame to the detector.
    fn pump_frame(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        match stream.next_frame() {
            Ok(frame) => {
                if let Err(e) = self.detector.submit(&frame) {
                    tracing::debug!(error = %e, seq = frame.sequence, "detector rejected frame");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "capture stream failed; stopping session");
                self.register.seal();
                self.teardown();
                self.fail(e.into());
            }
        }
    }

    /// Release every held resource. Each release is attempted even if the
    /// other fails; failures are logged and dropped.
    fn teardown(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = self.provider.release(stream) {
                tracing::warn!(error = %e, "capture device release failed");
            }
        }
        if std::mem::take(&mut self.detector_live) {
            if let Err(e) = self.detector.close() {
                tracing::warn!(error = %e, "landmark detector close failed");
            }
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        tracing::warn!(error = %err, "tracking session failed");
        self.set_state(SessionState::Failed(err.to_string()));
        err
    }

    fn set_state(&self, next: SessionState) {
        tracing::debug!(state = ?next, "session state");
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face_at, FakeDetector, FakeProvider, Probe};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_state(session: &TrackingSession, f: impl Fn(&SessionState) -> bool) {
        let mut rx = session.subscribe_state();
        tokio::time::timeout(WAIT, rx.wait_for(|s| f(s)))
            .await
            .expect("timed out waiting for session state")
            .expect("session state channel closed");
    }

    async fn wait_until(f: impl Fn() -> bool) {
        tokio::time::timeout(WAIT, async {
            while !f() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for condition");
    }

    fn spawn(provider: FakeProvider, detector: FakeDetector) -> TrackingSession {
        TrackingSession::spawn(provider, detector, SessionSettings::default())
    }

    #[tokio::test]
    async fn test_open_reaches_running_and_pumps_frames() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        assert_eq!(session.state(), SessionState::Idle);

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(probe.acquired(), 1);
        assert_eq!(probe.initialized(), 1);

        wait_until(|| probe.submitted() >= 3).await;
        session.close().await;
    }

    #[tokio::test]
    async fn test_detection_reaches_register() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();

        let sink = probe.last_sink().unwrap();
        assert!(sink.publish(Some(face_at(0.4, 0.45))));
        assert_eq!(session.register().latest().as_deref(), Some(&face_at(0.4, 0.45)));

        assert!(sink.publish(None));
        assert!(session.register().latest().is_none());
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_releases_both_and_is_idempotent() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();

        session.close().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);

        session.close().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);
    }

    #[tokio::test]
    async fn test_close_on_idle_is_noop() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.close().await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(probe.released(), 0);
        assert_eq!(probe.closed(), 0);
    }

    #[tokio::test]
    async fn test_close_while_starting_releases_everything() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe).with_acquire_delay(Duration::from_millis(50));
        let session = spawn(provider, FakeDetector::new(&probe));

        let opening = session.open();
        let closing = session.close();
        assert_eq!(opening.await, Err(SessionError::Cancelled));
        closing.await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(probe.acquired(), 1);
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);
        assert_eq!(probe.submitted(), 0, "no frame pumped after close");
    }

    #[tokio::test]
    async fn test_late_callback_after_close_is_ignored() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();

        let sink = probe.last_sink().unwrap();
        sink.publish(Some(face_at(0.3, 0.3)));

        // Close begins; the detector's in-flight result resolves afterwards.
        let closing = session.close();
        let late = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            sink.publish(Some(face_at(0.9, 0.9)))
        });
        closing.await;
        assert!(!late.join().unwrap());

        assert!(session.register().latest().is_none());
        assert_eq!(session.register().snapshot().sequence, 1);
    }

    #[tokio::test]
    async fn test_device_failure_surfaces_and_holds_nothing() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe)
            .failing_with(DeviceError::PermissionDenied("/dev/video0".into()));
        let session = spawn(provider, FakeDetector::new(&probe));

        let err = session.open().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Device(DeviceError::PermissionDenied("/dev/video0".into()))
        );
        assert!(matches!(session.state(), SessionState::Failed(reason) if reason.contains("permission")));
        assert_eq!(probe.initialized(), 0);
        assert_eq!(probe.released(), 0);
    }

    #[tokio::test]
    async fn test_detector_failure_releases_device() {
        let probe = Probe::default();
        let detector = FakeDetector::new(&probe).failing_init();
        let session = spawn(FakeProvider::new(&probe), detector);

        let err = session.open().await.unwrap_err();
        assert!(matches!(err, SessionError::Detector(_)));
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert_eq!(probe.acquired(), 1);
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 0, "detector never came up");

        // Failed -> Stopped on close, without touching resources again.
        session.close().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(probe.released(), 1);
    }

    #[tokio::test]
    async fn test_reopen_after_failure() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe).failing_first(DeviceError::DeviceBusy);
        let session = spawn(provider, FakeDetector::new(&probe));

        assert_eq!(
            session.open().await,
            Err(SessionError::Device(DeviceError::DeviceBusy))
        );
        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Running);
        session.close().await;
    }

    #[tokio::test]
    async fn test_release_failures_do_not_skip_each_other() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe).failing_release();
        let detector = FakeDetector::new(&probe).failing_close();
        let session = spawn(provider, detector);
        session.open().await.unwrap();

        session.close().await;
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_open_while_running_is_noop() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();
        session.open().await.unwrap();
        assert_eq!(probe.acquired(), 1);
        session.close().await;
    }

    #[tokio::test]
    async fn test_reopen_gets_fresh_register() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();
        let first = probe.last_sink().unwrap();
        first.publish(Some(face_at(0.2, 0.2)));
        session.close().await;

        session.open().await.unwrap();
        assert!(session.register().latest().is_none());
        assert!(!first.publish(Some(face_at(0.8, 0.8))));
        assert!(probe.last_sink().unwrap().publish(Some(face_at(0.6, 0.6))));
        assert_eq!(session.register().latest().as_deref(), Some(&face_at(0.6, 0.6)));
        session.close().await;
    }

    #[tokio::test]
    async fn test_capture_failure_while_running() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe).stream_fails_after(30);
        let session = spawn(provider, FakeDetector::new(&probe));
        session.open().await.unwrap();
        assert!(probe.last_sink().unwrap().publish(Some(face_at(0.3, 0.3))));
        assert!(session.register().latest().is_some());

        wait_for_state(&session, |s| matches!(s, SessionState::Failed(_))).await;
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);
        assert!(session.register().is_sealed());
        // The last face must not stay frozen on screen.
        assert!(session.register().latest().is_none());
    }

    #[tokio::test]
    async fn test_close_during_detector_init_refuses_its_sink() {
        let probe = Probe::default();
        let detector = FakeDetector::new(&probe).with_init_delay(Duration::from_millis(50));
        let session = spawn(FakeProvider::new(&probe), detector);

        let opening = session.open();
        wait_until(|| probe.acquired() == 1).await;
        let closing = session.close();
        assert_eq!(opening.await, Err(SessionError::Cancelled));
        closing.await;

        let sink = probe.last_sink().unwrap();
        assert!(!sink.publish(Some(face_at(0.5, 0.5))));
        assert!(session.register().is_sealed());
        assert!(session.register().latest().is_none());
        assert_eq!(probe.released(), 1);
        assert_eq!(probe.closed(), 1);
    }

    #[tokio::test]
    async fn test_drop_cancels_queued_open() {
        let probe = Probe::default();
        let provider = FakeProvider::new(&probe).with_acquire_delay(Duration::from_millis(30));
        let session = spawn(provider, FakeDetector::new(&probe));
        let register = session.register().clone();

        let opening = session.open();
        drop(session);

        assert_eq!(opening.await, Err(SessionError::Cancelled));
        assert!(register.is_sealed());
        assert!(!probe.last_sink().unwrap().publish(Some(face_at(0.5, 0.5))));
        wait_until(|| probe.released() == 1 && probe.closed() == 1).await;
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let probe = Probe::default();
        let session = spawn(FakeProvider::new(&probe), FakeDetector::new(&probe));
        session.open().await.unwrap();
        drop(session);

        wait_until(|| probe.released() == 1 && probe.closed() == 1).await;
    }
}

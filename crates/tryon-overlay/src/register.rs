//! Latest-detection register shared between the detector callback and the
//! render path.
//!
//! A single slot, replaced atomically on every accepted result. Results are
//! never queued: the most recent callback wins. Writes go through a
//! [`DetectionSink`] bound to one session activation; once the register is
//! sealed (or re-activated for a newer sink) the old sink's writes are
//! dropped and the last result is cleared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tryon_core::LandmarkSet;

/// The most recent detection result.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// `None` when the last processed frame had no face, or before the first
    /// result of this activation.
    pub landmarks: Option<Arc<LandmarkSet>>,
    /// Number of results accepted since activation.
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct Slot {
    /// Generation of the sink currently allowed to write.
    active: Option<u64>,
    /// Bumped by every [`LandmarkRegister::revoke`].
    epoch: u64,
    latest: Detection,
}

/// Single-slot holder for the latest detection.
#[derive(Debug, Clone)]
pub struct LandmarkRegister {
    slot: Arc<watch::Sender<Slot>>,
    generations: Arc<AtomicU64>,
}

impl LandmarkRegister {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Slot::default());
        Self {
            slot: Arc::new(tx),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issue a write handle for a new activation. It stays inert until
    /// passed to [`activate`](Self::activate).
    pub fn sink(&self) -> DetectionSink {
        DetectionSink {
            slot: Arc::clone(&self.slot),
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Accept writes from `sink` only, starting from an empty result.
    ///
    /// Refused, returning `false`, if the register was revoked since
    /// `epoch` was read. The check and the switch happen under one lock, so
    /// a concurrent [`revoke`](Self::revoke) either precedes and wins or
    /// follows and seals the new activation.
    pub fn activate(&self, sink: &DetectionSink, epoch: u64) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.epoch != epoch {
                return false;
            }
            slot.active = Some(sink.generation);
            slot.latest = Detection::default();
            true
        })
    }

    /// Stop accepting writes and drop the last result, so readers fall
    /// back to "no face" instead of a frozen one.
    pub fn seal(&self) {
        self.slot.send_if_modified(|slot| {
            let changed = slot.active.is_some() || slot.latest.landmarks.is_some();
            slot.active = None;
            slot.latest.landmarks = None;
            changed
        });
    }

    /// Seal and invalidate every epoch read so far.
    pub fn revoke(&self) {
        self.slot.send_modify(|slot| {
            slot.epoch += 1;
            slot.active = None;
            slot.latest.landmarks = None;
        });
    }

    /// Current revocation epoch, to be passed back to
    /// [`activate`](Self::activate).
    pub fn epoch(&self) -> u64 {
        self.slot.borrow().epoch
    }

    pub fn is_sealed(&self) -> bool {
        self.slot.borrow().active.is_none()
    }

    /// Landmarks from the latest result, if a face was found.
    pub fn latest(&self) -> Option<Arc<LandmarkSet>> {
        self.slot.borrow().latest.landmarks.clone()
    }

    pub fn snapshot(&self) -> Detection {
        self.slot.borrow().latest.clone()
    }
}

impl Default for LandmarkRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// Write handle given to the landmark detector as its result callback.
///
/// Cheap to clone and safe to call from any thread.
#[derive(Debug, Clone)]
pub struct DetectionSink {
    slot: Arc<watch::Sender<Slot>>,
    generation: u64,
}

impl DetectionSink {
    /// Replace the latest result. An empty set counts as "no face".
    ///
    /// Returns `false` when the write was dropped because this sink's
    /// activation is over (or has not begun).
    pub fn publish(&self, landmarks: Option<LandmarkSet>) -> bool {
        let landmarks = landmarks.filter(|set| !set.is_empty()).map(Arc::new);
        let accepted = self.slot.send_if_modified(|slot| {
            if slot.active != Some(self.generation) {
                return false;
            }
            slot.latest = Detection {
                landmarks,
                sequence: slot.latest.sequence + 1,
            };
            true
        });
        if !accepted {
            tracing::trace!(generation = self.generation, "dropping stale detection result");
        }
        accepted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counters describing how frames moved through a [`FrameThrottle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    /// Frames handed to [`FrameThrottle::submit`].
    pub submitted: u64,
    /// Frames replaced before the detector claimed them.
    pub dropped: u64,
    /// Frames handed to the detector.
    pub dispatched: u64,
}

struct Slots<T> {
    latest: Option<T>,
    processing: Option<Arc<T>>,
    stats: ThrottleStats,
}

/// Single-slot double buffer between a fast producer and a slow consumer.
///
/// The producer overwrites `latest` on every submit, so a burst of frames
/// collapses to the newest one. The consumer holds at most one frame in
/// `processing` and, when it finishes, atomically swaps in whatever is
/// waiting. Both slots live behind one mutex; every operation is an O(1)
/// swap and never waits on the other side.
///
/// ```text
///   submit ──► [latest] ──claim──► [processing] ──► detector
///                 ▲ overwritten          │
///                 └── drop-oldest        └── on_detector_idle
/// ```
pub struct FrameThrottle<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> FrameThrottle<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                latest: None,
                processing: None,
                stats: ThrottleStats::default(),
            }),
        }
    }

    /// Stores `frame` as the latest, replacing any unclaimed frame.
    ///
    /// Returns `true` if a waiting frame was dropped.
    pub fn submit(&self, frame: T) -> bool {
        let mut slots = self.lock();
        slots.stats.submitted += 1;
        let dropped = slots.latest.replace(frame).is_some();
        if dropped {
            slots.stats.dropped += 1;
        }
        dropped
    }

    /// Claims the latest frame if nothing is in flight.
    ///
    /// Called after a submit to start an idle consumer. Returns `None` when
    /// a frame is already being processed or nothing is waiting.
    pub fn try_claim(&self) -> Option<Arc<T>> {
        let mut slots = self.lock();
        if slots.processing.is_some() {
            return None;
        }
        Self::promote(&mut slots)
    }

    /// Signals that the consumer finished its current frame.
    ///
    /// Moves the latest frame into processing and returns it, or releases
    /// the processing slot and marks the throttle idle when nothing is
    /// waiting. Must be called after failures too, or the throttle stays
    /// busy forever.
    pub fn on_detector_idle(&self) -> Option<Arc<T>> {
        let mut slots = self.lock();
        slots.processing = None;
        Self::promote(&mut slots)
    }

    /// True when no frame is in flight.
    pub fn is_idle(&self) -> bool {
        self.lock().processing.is_none()
    }

    /// True when a frame is waiting to be claimed.
    pub fn has_pending(&self) -> bool {
        self.lock().latest.is_some()
    }

    pub fn stats(&self) -> ThrottleStats {
        self.lock().stats
    }

    /// Releases both slots. Counters are kept.
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.latest = None;
        slots.processing = None;
    }

    fn promote(slots: &mut Slots<T>) -> Option<Arc<T>> {
        let frame = Arc::new(slots.latest.take()?);
        slots.processing = Some(Arc::clone(&frame));
        slots.stats.dispatched += 1;
        Some(frame)
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        // Slots are plain values; a panic mid-swap cannot leave them torn.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for FrameThrottle<T> {
    fn default() -> Self {
        Self::new()
    }
}

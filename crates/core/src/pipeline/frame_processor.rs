use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::camera::domain::frame_sink::FrameSink;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::graphic_overlay::GraphicOverlay;
use crate::shared::frame::Frame;

use super::frame_throttle::{FrameThrottle, ThrottleStats};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::presenter::DetectionPresenter;

/// Called on the detector thread whenever detection fails.
pub type FailureHandler = Box<dyn Fn(&dyn std::error::Error) + Send>;

/// Everything that runs once per dispatched frame. Guarded by one mutex so
/// the streaming worker and [`FrameProcessor::process_image`] never run
/// the detector concurrently.
struct DetectionStage {
    detector: Box<dyn FaceDetector>,
    presenter: Box<dyn DetectionPresenter>,
    overlay: Arc<GraphicOverlay>,
    on_failure: FailureHandler,
    logger: Box<dyn PipelineLogger>,
    draw_camera_image: bool,
    closed: bool,
}

impl DetectionStage {
    /// Streaming path: failures go to the handler, never to the caller.
    fn run(&mut self, frame: &Frame) {
        let draw_image = self.draw_camera_image;
        if let Err(e) = self.detect_and_present(frame, draw_image) {
            log::warn!("Face detection failed on frame {}: {e}", frame.index());
            (self.on_failure)(e.as_ref());
        }
        self.logger.frame_processed(frame.index());
    }

    fn detect_and_present(
        &mut self,
        frame: &Frame,
        draw_image: bool,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        if self.closed {
            return Err("Detector is closed".into());
        }

        let t0 = Instant::now();
        let upright = frame.to_upright_rgb();
        self.logger
            .timing("decode", t0.elapsed().as_secs_f64() * 1000.0);

        let t1 = Instant::now();
        let faces = self.detector.detect(&upright)?;
        self.logger
            .timing("detect", t1.elapsed().as_secs_f64() * 1000.0);
        let count = faces.len();
        self.logger.metric("faces", count as f64);

        let t2 = Instant::now();
        let image = if draw_image {
            Some(Arc::new(upright.to_rgb_image()?))
        } else {
            None
        };
        let (width, height) = (upright.width(), upright.height());
        let facing = frame.metadata().facing_or_default();
        if self.overlay.preview_size() != (width, height) || self.overlay.camera_facing() != facing
        {
            self.overlay.set_camera_info(width, height, facing);
        }
        self.presenter
            .present(image, faces, frame.metadata(), &self.overlay);
        self.logger
            .timing("present", t2.elapsed().as_secs_f64() * 1000.0);

        Ok(count)
    }

    fn close(&mut self) {
        if !self.closed {
            self.detector.close();
            self.closed = true;
        }
    }
}

/// Connects a frame source to a detector running on its own thread.
///
/// Frames pass through a [`FrameThrottle`], so the source never waits on
/// detection and the detector always works on the freshest frame. The
/// worker thread converts each claimed frame to upright RGB, runs the
/// detector, hands results to the presenter, then asks the throttle for
/// the next frame, after failures too.
///
/// ```text
///  source ──process──► FrameThrottle ──claim──► worker: decode → detect → present
///                            ▲                                              │
///                            └───────────── on_detector_idle ◄──────────────┘
/// ```
pub struct FrameProcessor {
    throttle: Arc<FrameThrottle<Frame>>,
    stage: Arc<Mutex<DetectionStage>>,
    dispatch: Mutex<Option<Sender<Arc<Frame>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        presenter: Box<dyn DetectionPresenter>,
        overlay: Arc<GraphicOverlay>,
    ) -> Self {
        let throttle = Arc::new(FrameThrottle::new());
        let stage = Arc::new(Mutex::new(DetectionStage {
            detector,
            presenter,
            overlay,
            on_failure: Box::new(|e: &dyn std::error::Error| {
                log::error!("Face detection failed: {e}")
            }),
            logger: Box::new(NullPipelineLogger),
            draw_camera_image: true,
            closed: false,
        }));
        // One slot is enough: a frame is only dispatched while nothing is in flight.
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = spawn_worker(Arc::clone(&stage), Arc::clone(&throttle), rx);

        Self {
            throttle,
            stage,
            dispatch: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn with_failure_handler(self, handler: FailureHandler) -> Self {
        lock(&self.stage).on_failure = handler;
        self
    }

    pub fn with_logger(self, logger: Box<dyn PipelineLogger>) -> Self {
        lock(&self.stage).logger = logger;
        self
    }

    /// Whether presenters receive the detected frame to draw under the
    /// graphics. On by default since the overlay has no live preview
    /// beneath it.
    pub fn with_camera_image(self, enabled: bool) -> Self {
        lock(&self.stage).draw_camera_image = enabled;
        self
    }

    /// Accepts a frame from the source. Never blocks on detection.
    ///
    /// The frame replaces any frame still waiting; if the detector is idle
    /// it is dispatched immediately.
    pub fn process(&self, frame: Frame) {
        let dispatch = lock(&self.dispatch);
        let Some(tx) = dispatch.as_ref() else {
            log::trace!("Processor stopped, ignoring frame {}", frame.index());
            return;
        };

        let index = frame.index();
        if self.throttle.submit(frame) {
            log::trace!("Dropped a waiting frame in favor of frame {index}");
        }
        if let Some(claimed) = self.throttle.try_claim() {
            if tx.send(claimed).is_err() {
                log::debug!("Detector thread exited; releasing frame {index}");
                self.throttle.clear();
            }
        }
    }

    /// Detects faces in a single image on the calling thread, bypassing the
    /// throttle. The image is always drawn under the graphics.
    ///
    /// Returns the number of faces found.
    pub fn process_image(&self, frame: &Frame) -> Result<usize, Box<dyn std::error::Error>> {
        let mut stage = lock(&self.stage);
        let result = stage.detect_and_present(frame, true);
        stage.logger.frame_processed(frame.index());
        result
    }

    /// True when no frame is in flight or waiting.
    pub fn is_idle(&self) -> bool {
        self.throttle.is_idle() && !self.throttle.has_pending()
    }

    pub fn stats(&self) -> ThrottleStats {
        self.throttle.stats()
    }

    /// Stops accepting frames, lets the worker finish what it holds, closes
    /// the detector and releases both throttle slots. Idempotent.
    pub fn stop(&self) {
        let sender = lock(&self.dispatch).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                log::error!("Detector thread panicked");
            }
        }

        let stats = self.throttle.stats();
        self.throttle.clear();

        let mut stage = lock(&self.stage);
        stage.close();
        stage.logger.info(&format!(
            "Frames: {} submitted, {} detected, {} dropped",
            stats.submitted, stats.dispatched, stats.dropped
        ));
        stage.logger.summary();
    }
}

impl FrameSink for FrameProcessor {
    fn process(&self, frame: Frame) {
        FrameProcessor::process(self, frame);
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(
    stage: Arc<Mutex<DetectionStage>>,
    throttle: Arc<FrameThrottle<Frame>>,
    dispatch_rx: Receiver<Arc<Frame>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for first in dispatch_rx {
            let mut next = Some(first);
            while let Some(frame) = next {
                lock(&stage).run(&frame);
                next = throttle.on_detector_idle();
            }
        }
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face::Face;
    use crate::pipeline::presenter::FaceDetectionPresenter;
    use crate::shared::frame_metadata::{FrameMetadata, Rotation};
    use crate::shared::geometry::BoundingBox;
    use crate::shared::pixel_format::{rgb_to_nv21, PixelFormat};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn frame(index: usize) -> Frame {
        Frame::rgb(vec![0u8; 8 * 8 * 3], 8, 8, index).unwrap()
    }

    fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached in time");
    }

    /// Blocks inside `detect` until the test releases it.
    struct GatedDetector {
        started: Sender<usize>,
        release: Receiver<()>,
        seen: Arc<Mutex<Vec<usize>>>,
    }

    impl FaceDetector for GatedDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
            self.seen.lock().unwrap().push(frame.index());
            self.started.send(frame.index()).unwrap();
            self.release.recv()?;
            Ok(Vec::new())
        }
    }

    /// Fails on the frame indices it is told to, records every call.
    struct ScriptedDetector {
        fail_on: Vec<usize>,
        seen: Arc<Mutex<Vec<(usize, u32, u32)>>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedDetector {
        fn new(fail_on: Vec<usize>) -> (Self, Arc<Mutex<Vec<(usize, u32, u32)>>>, Arc<AtomicBool>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let detector = Self {
                fail_on,
                seen: Arc::clone(&seen),
                closed: Arc::clone(&closed),
            };
            (detector, seen, closed)
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
            self.seen
                .lock()
                .unwrap()
                .push((frame.index(), frame.width(), frame.height()));
            if self.fail_on.contains(&frame.index()) {
                return Err(format!("model error on frame {}", frame.index()).into());
            }
            Ok(vec![Face::new(BoundingBox::from_xywh(1, 1, 4, 4))])
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn processor(detector: impl FaceDetector + 'static) -> (FrameProcessor, Arc<GraphicOverlay>) {
        let overlay = Arc::new(GraphicOverlay::new());
        let processor = FrameProcessor::new(
            Box::new(detector),
            Box::new(FaceDetectionPresenter::new(None)),
            Arc::clone(&overlay),
        );
        (processor, overlay)
    }

    #[test]
    fn test_only_newest_frame_reaches_busy_detector() {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (processor, _) = processor(GatedDetector {
            started: started_tx,
            release: release_rx,
            seen: Arc::clone(&seen),
        });

        processor.process(frame(0));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(0));

        for i in 1..=3 {
            processor.process(frame(i));
        }
        release_tx.send(()).unwrap();
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(3));
        release_tx.send(()).unwrap();

        processor.stop();
        assert_eq!(*seen.lock().unwrap(), vec![0, 3]);
        let stats = processor.stats();
        assert_eq!((stats.submitted, stats.dispatched, stats.dropped), (4, 2, 2));
    }

    #[test]
    fn test_failure_reports_and_next_frame_is_processed() {
        let (detector, seen, _) = ScriptedDetector::new(vec![0]);
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let (processor, overlay) = processor(detector);
        let processor = processor.with_failure_handler(Box::new(move |e: &dyn std::error::Error| {
            assert!(e.to_string().contains("frame 0"));
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        processor.process(frame(0));
        wait_until(|| processor.is_idle());
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(overlay.generation(), 0);

        processor.process(frame(1));
        wait_until(|| processor.is_idle());
        processor.stop();

        let indices: Vec<_> = seen.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(overlay.generation(), 1);
    }

    #[test]
    fn test_success_presents_image_and_faces() {
        let (detector, _, _) = ScriptedDetector::new(vec![]);
        let (processor, overlay) = processor(detector);

        processor.process(frame(0));
        wait_until(|| processor.is_idle());

        // Camera image plus one face graphic
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay.preview_size(), (8, 8));
    }

    #[test]
    fn test_camera_image_can_be_disabled() {
        let (detector, _, _) = ScriptedDetector::new(vec![]);
        let (processor, overlay) = processor(detector);
        let processor = processor.with_camera_image(false);

        processor.process(frame(0));
        wait_until(|| processor.is_idle());

        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_detector_sees_upright_rgb() {
        let (detector, seen, _) = ScriptedDetector::new(vec![]);
        let (processor, _) = processor(detector);

        let rgb = vec![128u8; 6 * 4 * 3];
        let metadata = FrameMetadata::new(6, 4).with_rotation(Rotation::Deg90);
        let nv21 = Frame::new(rgb_to_nv21(&rgb, 6, 4), metadata, PixelFormat::Nv21, 7).unwrap();

        processor.process(nv21);
        processor.stop();

        assert_eq!(*seen.lock().unwrap(), vec![(7, 4, 6)]);
    }

    #[test]
    fn test_process_image_bypasses_throttle() {
        let (detector, _, _) = ScriptedDetector::new(vec![3]);
        let (processor, overlay) = processor(detector);
        let processor = processor.with_camera_image(false);

        assert_eq!(processor.process_image(&frame(0)).unwrap(), 1);
        assert_eq!(overlay.len(), 2);
        assert_eq!(processor.stats(), ThrottleStats::default());

        assert!(processor.process_image(&frame(3)).is_err());
    }

    #[test]
    fn test_stop_closes_detector_and_ignores_later_frames() {
        let (detector, seen, closed) = ScriptedDetector::new(vec![]);
        let (processor, _) = processor(detector);

        processor.stop();
        processor.stop();
        processor.process(frame(0));

        assert!(closed.load(Ordering::SeqCst));
        assert!(seen.lock().unwrap().is_empty());
        assert!(processor.process_image(&frame(1)).is_err());
    }

    #[test]
    fn test_concurrent_source_never_overlaps_detection() {
        struct CountingDetector {
            in_flight: Arc<AtomicUsize>,
            max_in_flight: Arc<AtomicUsize>,
        }

        impl FaceDetector for CountingDetector {
            fn detect(&mut self, _frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
        }

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (processor, _) = processor(CountingDetector {
            in_flight: Arc::clone(&in_flight),
            max_in_flight: Arc::clone(&max_in_flight),
        });
        let processor = Arc::new(processor);

        let producers: Vec<_> = (0..2)
            .map(|p| {
                let processor = Arc::clone(&processor);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        processor.process(frame(p * 1000 + i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        processor.stop();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        let stats = processor.stats();
        assert_eq!(stats.submitted, 400);
        assert_eq!(stats.dispatched + stats.dropped, 400);
    }
}

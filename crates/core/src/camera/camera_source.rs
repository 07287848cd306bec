use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::overlay::domain::graphic_overlay::GraphicOverlay;
use crate::shared::frame_metadata::CameraFacing;

use super::domain::frame_sink::FrameSink;
use super::domain::frame_source::{CameraInfo, FrameSource};

/// Result of one capture run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureSummary {
    pub frames_delivered: usize,
    /// Set when the source failed mid-stream.
    pub error: Option<String>,
}

struct CaptureRun {
    source: Box<dyn FrameSource>,
    summary: CaptureSummary,
}

/// Drives a [`FrameSource`] on a capture thread and hands every frame to
/// the configured [`FrameSink`].
///
/// On start the overlay learns the preview size and camera facing. With
/// realtime pacing, frames are delivered at the source's native rate so a
/// file behaves like a live camera; otherwise they arrive as fast as the
/// source decodes. Changing the facing while running restarts capture.
pub struct CameraSource {
    source: Option<Box<dyn FrameSource>>,
    overlay: Arc<GraphicOverlay>,
    sink: Option<Arc<dyn FrameSink>>,
    facing: CameraFacing,
    realtime: bool,
    max_frames: Option<usize>,
    info: Option<CameraInfo>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<CaptureRun>>,
}

impl CameraSource {
    pub fn new(source: Box<dyn FrameSource>, overlay: Arc<GraphicOverlay>) -> Self {
        Self {
            source: Some(source),
            overlay,
            sink: None,
            facing: CameraFacing::default(),
            realtime: false,
            max_frames: None,
            info: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn set_frame_processor(&mut self, sink: Arc<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    pub fn set_realtime(&mut self, realtime: bool) {
        self.realtime = realtime;
    }

    /// Stops capture after `limit` frames.
    pub fn set_max_frames(&mut self, limit: Option<usize>) {
        self.max_frames = limit;
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    /// Info reported by the source on the last start.
    pub fn info(&self) -> Option<CameraInfo> {
        self.info
    }

    /// Selects the camera facing, restarting capture if it is running.
    pub fn set_facing(&mut self, facing: CameraFacing) -> Result<(), Box<dyn std::error::Error>> {
        if facing == self.facing {
            return Ok(());
        }
        let was_running = self.worker.is_some();
        if was_running {
            self.stop();
        }
        log::info!("Switching camera facing to {facing}");
        self.facing = facing;
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Opens the source and starts delivering frames on a new thread.
    pub fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut source = self
            .source
            .take()
            .ok_or("Camera source is already running or was released")?;

        let info = match source.open(self.facing) {
            Ok(info) => info,
            Err(e) => {
                self.source = Some(source);
                return Err(e);
            }
        };
        let (width, height) = info.upright_size();
        self.overlay.set_camera_info(width, height, info.facing);
        self.info = Some(info);
        log::info!(
            "Camera started: {}x{} {:?}, facing {}, fps {:?}",
            info.width,
            info.height,
            info.rotation,
            info.facing,
            info.fps
        );

        let interval = match (self.realtime, info.fps) {
            (true, Some(fps)) if fps > 0.0 => Some(Duration::from_secs_f64(1.0 / fps)),
            _ => None,
        };
        self.running.store(true, Ordering::SeqCst);
        self.worker = Some(spawn_capture(
            source,
            self.sink.clone(),
            Arc::clone(&self.running),
            interval,
            self.max_frames,
        ));
        Ok(())
    }

    /// True while the capture thread is delivering frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Blocks until the source runs out of frames or the frame limit is hit.
    pub fn wait(&mut self) -> Option<CaptureSummary> {
        self.join()
    }

    /// Stops capture and waits for the capture thread to exit.
    pub fn stop(&mut self) -> Option<CaptureSummary> {
        self.running.store(false, Ordering::SeqCst);
        self.join()
    }

    /// Stops capture, detaches the frame processor and closes the source.
    pub fn release(&mut self) {
        self.stop();
        self.sink = None;
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }

    fn join(&mut self) -> Option<CaptureSummary> {
        let handle = self.worker.take()?;
        match handle.join() {
            Ok(run) => {
                self.source = Some(run.source);
                Some(run.summary)
            }
            Err(_) => {
                log::error!("Capture thread panicked");
                Some(CaptureSummary {
                    frames_delivered: 0,
                    error: Some("Capture thread panicked".to_string()),
                })
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    sink: Option<Arc<dyn FrameSink>>,
    running: Arc<AtomicBool>,
    interval: Option<Duration>,
    max_frames: Option<usize>,
) -> JoinHandle<CaptureRun> {
    std::thread::spawn(move || {
        let mut summary = CaptureSummary::default();
        let mut deadline = Instant::now();

        while running.load(Ordering::SeqCst) {
            if max_frames.is_some_and(|max| summary.frames_delivered >= max) {
                break;
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::debug!("Camera source reached end of stream");
                    break;
                }
                Err(e) => {
                    log::error!("Camera source failed: {e}");
                    summary.error = Some(e.to_string());
                    break;
                }
            };

            if let Some(sink) = sink.as_ref() {
                sink.process(frame);
            }
            summary.frames_delivered += 1;

            if let Some(interval) = interval {
                deadline += interval;
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                } else {
                    deadline = now;
                }
            }
        }

        source.close();
        running.store(false, Ordering::SeqCst);
        CaptureRun { source, summary }
    })
}

use std::path::PathBuf;

use crate::detection::domain::detector_options::DetectorOptions;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::TRACKER_MAX_LOST;

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::replay_face_detector::ReplayFaceDetector;
use super::tracking_face_detector::TrackingFaceDetector;

/// Where detections come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectorBackend {
    /// BlazeFace ONNX model at the given path.
    Onnx { model_path: PathBuf },
    /// Recorded detections from a JSON file.
    Replay { path: PathBuf, looping: bool },
}

/// Creates a detector for `backend`, wrapped in a tracker when
/// `options.tracking` is set.
pub fn create_detector(
    backend: &DetectorBackend,
    options: DetectorOptions,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let tracking = options.tracking;
    let detector: Box<dyn FaceDetector> = match backend {
        DetectorBackend::Onnx { model_path } => {
            log::info!(
                "Using BlazeFace detector ({:?}, confidence={}) from {}",
                options.performance_mode,
                options.confidence,
                model_path.display()
            );
            Box::new(OnnxBlazefaceDetector::new(model_path, options)?)
        }
        DetectorBackend::Replay { path, looping } => {
            log::info!("Replaying detections from {} (looping={})", path.display(), looping);
            Box::new(ReplayFaceDetector::from_file(path, *looping)?)
        }
    };

    if tracking {
        log::debug!("Tracking enabled (max_lost={TRACKER_MAX_LOST})");
        Ok(Box::new(TrackingFaceDetector::new(detector, TRACKER_MAX_LOST)))
    } else {
        Ok(detector)
    }
}

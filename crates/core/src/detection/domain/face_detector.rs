use crate::detection::domain::face::Face;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// The pipeline always passes upright RGB frames. Implementations may be
/// stateful (e.g., tracking across frames), hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>>;

    /// Releases model resources. Called once when the pipeline stops.
    fn close(&mut self) {}
}

use crate::shared::frame::Frame;
use crate::shared::frame_metadata::{CameraFacing, Rotation};

/// What a source reports once opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraInfo {
    /// Frame size as captured, before rotation.
    pub width: u32,
    pub height: u32,
    /// Native frame rate, if the source has one.
    pub fps: Option<f64>,
    pub rotation: Rotation,
    pub facing: CameraFacing,
}

impl CameraInfo {
    /// Preview size once frames are rotated upright.
    pub fn upright_size(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Produces camera-like frames one at a time.
///
/// Implementations hide the device or container details; the capture loop
/// only sees [`Frame`]s tagged with their metadata.
pub trait FrameSource: Send {
    /// Opens the input for the requested camera facing.
    fn open(&mut self, facing: CameraFacing) -> Result<CameraInfo, Box<dyn std::error::Error>>;

    /// Returns the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}

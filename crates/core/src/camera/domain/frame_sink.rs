use crate::shared::frame::Frame;

/// Receives frames from a capture thread.
///
/// `process` is called on the capture thread for every frame and must not
/// block on downstream work.
pub trait FrameSink: Send + Sync {
    fn process(&self, frame: Frame);
}

use super::canvas::Canvas;
use super::graphic_overlay::OverlayTransform;

/// One drawable element of a [`GraphicOverlay`](super::graphic_overlay::GraphicOverlay).
///
/// Graphics hold detection data in image coordinates and map them to view
/// coordinates through the transform at draw time.
pub trait Graphic: Send + Sync {
    fn draw(&self, canvas: &mut dyn Canvas, transform: &OverlayTransform);
}

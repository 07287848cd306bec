use std::sync::Arc;

use image::RgbImage;

use super::canvas::Canvas;
use super::graphic::Graphic;
use super::graphic_overlay::OverlayTransform;

/// Draws the frame the detector saw, stretched over the whole view.
///
/// Added first so face graphics land on top of it.
pub struct CameraImageGraphic {
    image: Arc<RgbImage>,
}

impl CameraImageGraphic {
    pub fn new(image: Arc<RgbImage>) -> Self {
        Self { image }
    }
}

impl Graphic for CameraImageGraphic {
    fn draw(&self, canvas: &mut dyn Canvas, _transform: &OverlayTransform) {
        canvas.draw_image(&self.image);
    }
}

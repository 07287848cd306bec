use std::sync::Arc;

use image::{RgbImage, RgbaImage};

use crate::detection::domain::face::Face;
use crate::overlay::domain::camera_image_graphic::CameraImageGraphic;
use crate::overlay::domain::face_contour_graphic::FaceContourGraphic;
use crate::overlay::domain::face_graphic::FaceGraphic;
use crate::overlay::domain::graphic::Graphic;
use crate::overlay::domain::graphic_overlay::GraphicOverlay;
use crate::shared::frame_metadata::FrameMetadata;

/// Turns one successful detection into overlay graphics.
///
/// Implementations replace the overlay contents wholesale in one step: the
/// camera image when given, then one graphic per face, then invalidate.
pub trait DetectionPresenter: Send {
    fn present(
        &self,
        original_image: Option<Arc<RgbImage>>,
        faces: Vec<Face>,
        metadata: &FrameMetadata,
        overlay: &GraphicOverlay,
    );
}

fn present_with<F>(
    original_image: Option<Arc<RgbImage>>,
    faces: Vec<Face>,
    overlay: &GraphicOverlay,
    graphic_for: F,
) where
    F: FnMut(Face) -> Box<dyn Graphic>,
{
    let mut graphics: Vec<Box<dyn Graphic>> = Vec::with_capacity(faces.len() + 1);
    if let Some(image) = original_image {
        graphics.push(Box::new(CameraImageGraphic::new(image)));
    }
    graphics.extend(faces.into_iter().map(graphic_for));
    overlay.replace(graphics);
    overlay.post_invalidate();
}

/// Draws faces with landmarks, probabilities and an optional nose bitmap.
pub struct FaceDetectionPresenter {
    overlay_bitmap: Option<Arc<RgbaImage>>,
}

impl FaceDetectionPresenter {
    pub fn new(overlay_bitmap: Option<Arc<RgbaImage>>) -> Self {
        Self { overlay_bitmap }
    }
}

impl DetectionPresenter for FaceDetectionPresenter {
    fn present(
        &self,
        original_image: Option<Arc<RgbImage>>,
        faces: Vec<Face>,
        metadata: &FrameMetadata,
        overlay: &GraphicOverlay,
    ) {
        let facing = metadata.facing_or_default();
        present_with(original_image, faces, overlay, |face| {
            Box::new(FaceGraphic::new(face, facing, self.overlay_bitmap.clone()))
        });
    }
}

/// Draws face contours.
pub struct FaceContourPresenter;

impl DetectionPresenter for FaceContourPresenter {
    fn present(
        &self,
        original_image: Option<Arc<RgbImage>>,
        faces: Vec<Face>,
        _metadata: &FrameMetadata,
        overlay: &GraphicOverlay,
    ) {
        present_with(original_image, faces, overlay, |face| {
            Box::new(FaceContourGraphic::new(face))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::infrastructure::recording_canvas::{DrawOp, RecordingCanvas};
    use crate::shared::frame_metadata::CameraFacing;
    use crate::shared::geometry::BoundingBox;

    fn faces(n: i32) -> Vec<Face> {
        (0..n)
            .map(|i| Face::new(BoundingBox::from_xywh(i * 60, 0, 50, 50)))
            .collect()
    }

    fn eye_label_x(overlay: &GraphicOverlay, prefix: &str) -> f32 {
        let mut canvas = RecordingCanvas::new(400, 400);
        overlay.draw(&mut canvas);
        canvas
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { text, x, .. } if text.starts_with(prefix) => Some(*x),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_replaces_previous_graphics_and_invalidates() {
        let overlay = GraphicOverlay::new();
        let presenter = FaceDetectionPresenter::new(None);
        let metadata = FrameMetadata::new(400, 400);

        presenter.present(None, faces(3), &metadata, &overlay);
        presenter.present(None, faces(1), &metadata, &overlay);

        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.generation(), 2);
    }

    #[test]
    fn test_camera_image_is_drawn_first() {
        let overlay = GraphicOverlay::new();
        let image = Arc::new(RgbImage::new(400, 400));

        FaceContourPresenter.present(
            Some(image),
            faces(2),
            &FrameMetadata::new(400, 400),
            &overlay,
        );

        assert_eq!(overlay.len(), 3);
        let mut canvas = RecordingCanvas::new(400, 400);
        overlay.draw(&mut canvas);
        assert!(matches!(canvas.ops()[0], DrawOp::Image { .. }));
    }

    #[test]
    fn test_empty_result_still_clears_and_invalidates() {
        let overlay = GraphicOverlay::new();
        let metadata = FrameMetadata::new(400, 400);
        FaceContourPresenter.present(None, faces(2), &metadata, &overlay);

        FaceContourPresenter.present(None, Vec::new(), &metadata, &overlay);

        assert!(overlay.is_empty());
        assert_eq!(overlay.generation(), 2);
    }

    #[test]
    fn test_unknown_facing_renders_as_back() {
        let overlay = GraphicOverlay::new();
        let presenter = FaceDetectionPresenter::new(None);

        presenter.present(None, faces(1), &FrameMetadata::new(400, 400), &overlay);
        let unknown = eye_label_x(&overlay, "left eye");

        let back = FrameMetadata::new(400, 400).with_facing(CameraFacing::Back);
        presenter.present(None, faces(1), &back, &overlay);
        assert_eq!(eye_label_x(&overlay, "left eye"), unknown);

        let front = FrameMetadata::new(400, 400).with_facing(CameraFacing::Front);
        presenter.present(None, faces(1), &front, &overlay);
        assert_ne!(eye_label_x(&overlay, "left eye"), unknown);
    }

    #[test]
    fn test_concurrent_reader_never_sees_partial_overlay() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let overlay = Arc::new(GraphicOverlay::new());
        let done = Arc::new(AtomicBool::new(false));
        let image = Arc::new(RgbImage::new(4, 4));
        FaceContourPresenter.present(
            Some(Arc::clone(&image)),
            faces(2),
            &FrameMetadata::new(400, 400),
            &overlay,
        );

        let reader = {
            let overlay = Arc::clone(&overlay);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut partial = 0;
                while !done.load(Ordering::SeqCst) {
                    if overlay.len() != 3 {
                        partial += 1;
                    }
                }
                partial
            })
        };

        let presenter = FaceDetectionPresenter::new(None);
        let metadata = FrameMetadata::new(400, 400);
        for _ in 0..20_000 {
            presenter.present(Some(Arc::clone(&image)), faces(2), &metadata, &overlay);
        }
        done.store(true, Ordering::SeqCst);

        assert_eq!(reader.join().unwrap(), 0);
    }
}

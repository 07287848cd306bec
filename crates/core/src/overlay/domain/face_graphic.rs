use std::sync::Arc;

use image::RgbaImage;

use crate::detection::domain::face::{Face, FaceLandmark};
use crate::shared::frame_metadata::CameraFacing;

use super::canvas::{Canvas, Color, WHITE};
use super::graphic::Graphic;
use super::graphic_overlay::OverlayTransform;

const FACE_POSITION_RADIUS: f32 = 4.0;
const ID_TEXT_SIZE: f32 = 30.0;
const ID_Y_OFFSET: f32 = 50.0;
const ID_X_OFFSET: f32 = -50.0;
const BOX_STROKE_WIDTH: f32 = 5.0;
const LANDMARK_RADIUS: f32 = 10.0;

/// Shown when the detector did not compute a value.
const UNCOMPUTED: f32 = -1.0;

/// Landmark dots in draw order, split where the nose bitmap is painted.
const DOTS_BEFORE_NOSE: [FaceLandmark; 5] = [
    FaceLandmark::MouthBottom,
    FaceLandmark::LeftCheek,
    FaceLandmark::LeftEar,
    FaceLandmark::MouthLeft,
    FaceLandmark::LeftEye,
];
const DOTS_AFTER_NOSE: [FaceLandmark; 4] = [
    FaceLandmark::RightCheek,
    FaceLandmark::RightEar,
    FaceLandmark::RightEye,
    FaceLandmark::MouthRight,
];

/// Renders one face: position marker, id and probability labels, bounding
/// box, landmark dots and an optional bitmap over the nose base.
///
/// Labels sit above the box center. Eye labels swap sides for front-facing
/// cameras so they stay next to the eye they describe in the mirrored view.
pub struct FaceGraphic {
    face: Face,
    facing: CameraFacing,
    overlay_bitmap: Option<Arc<RgbaImage>>,
    color: Color,
}

impl FaceGraphic {
    pub fn new(face: Face, facing: CameraFacing, overlay_bitmap: Option<Arc<RgbaImage>>) -> Self {
        Self {
            face,
            facing,
            overlay_bitmap,
            color: WHITE,
        }
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    fn draw_labels(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        let face = &self.face;
        let id = face.tracking_id.map_or(-1, i64::from);
        canvas.draw_text(
            &format!("id: {id}"),
            x + ID_X_OFFSET,
            y - 3.0 * ID_Y_OFFSET,
            ID_TEXT_SIZE,
            self.color,
        );
        canvas.draw_text(
            &format!("happiness: {:.2}", face.smiling_probability.unwrap_or(UNCOMPUTED)),
            x + ID_X_OFFSET * 3.0,
            y - 2.0 * ID_Y_OFFSET,
            ID_TEXT_SIZE,
            self.color,
        );

        let left_eye = format!(
            "left eye: {:.2}",
            face.left_eye_open_probability.unwrap_or(UNCOMPUTED)
        );
        let right_eye = format!(
            "right eye: {:.2}",
            face.right_eye_open_probability.unwrap_or(UNCOMPUTED)
        );
        let (near, far) = match self.facing {
            CameraFacing::Front => (right_eye, left_eye),
            CameraFacing::Back => (left_eye, right_eye),
        };
        canvas.draw_text(&near, x - ID_X_OFFSET, y, ID_TEXT_SIZE, self.color);
        canvas.draw_text(&far, x + ID_X_OFFSET * 6.0, y, ID_TEXT_SIZE, self.color);
    }

    fn draw_landmark(&self, canvas: &mut dyn Canvas, t: &OverlayTransform, kind: FaceLandmark) {
        if let Some(point) = self.face.landmark(kind) {
            canvas.draw_circle(
                t.translate_x(point.x),
                t.translate_y(point.y),
                LANDMARK_RADIUS,
                self.color,
            );
        }
    }

    fn draw_nose_bitmap(&self, canvas: &mut dyn Canvas, t: &OverlayTransform) {
        let (Some(bitmap), Some(nose)) = (
            self.overlay_bitmap.as_deref(),
            self.face.landmark(FaceLandmark::NoseBase),
        ) else {
            return;
        };
        let half_edge = self.face.bounding_box.width() as f32 / 4.0;
        let x = t.translate_x(nose.x);
        let y = t.translate_y(nose.y);
        canvas.draw_bitmap(
            bitmap,
            (x - half_edge) as i32,
            (y - half_edge) as i32,
            (x + half_edge) as i32,
            (y + half_edge) as i32,
        );
    }
}

impl Graphic for FaceGraphic {
    fn draw(&self, canvas: &mut dyn Canvas, t: &OverlayTransform) {
        let bbox = &self.face.bounding_box;
        let x = t.translate_x(bbox.center_x());
        let y = t.translate_y(bbox.center_y());

        canvas.draw_circle(x, y - 4.0 * ID_Y_OFFSET, FACE_POSITION_RADIUS, self.color);
        self.draw_labels(canvas, x, y);

        let x_offset = t.scale_x(bbox.width() as f32 / 2.0);
        let y_offset = t.scale_y(bbox.height() as f32 / 2.0);
        canvas.draw_rect(
            x - x_offset,
            y - y_offset,
            x + x_offset,
            y + y_offset,
            BOX_STROKE_WIDTH,
            self.color,
        );

        for kind in DOTS_BEFORE_NOSE {
            self.draw_landmark(canvas, t, kind);
        }
        self.draw_nose_bitmap(canvas, t);
        for kind in DOTS_AFTER_NOSE {
            self.draw_landmark(canvas, t, kind);
        }
    }
}

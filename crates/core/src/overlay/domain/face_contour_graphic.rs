use crate::detection::domain::face::Face;

use super::canvas::{Canvas, Color, WHITE};
use super::graphic::Graphic;
use super::graphic_overlay::OverlayTransform;

const FACE_POSITION_RADIUS: f32 = 4.0;
const ID_TEXT_SIZE: f32 = 30.0;
const ID_Y_OFFSET: f32 = 80.0;
const ID_X_OFFSET: f32 = -70.0;
const BOX_STROKE_WIDTH: f32 = 5.0;

/// Renders a face's bounding box and every contour point as a small dot.
///
/// Probability labels are only drawn when the detector computed them.
pub struct FaceContourGraphic {
    face: Face,
    color: Color,
}

impl FaceContourGraphic {
    pub fn new(face: Face) -> Self {
        Self { face, color: WHITE }
    }
}

impl Graphic for FaceContourGraphic {
    fn draw(&self, canvas: &mut dyn Canvas, t: &OverlayTransform) {
        let face = &self.face;
        let bbox = &face.bounding_box;
        let x = t.translate_x(bbox.center_x());
        let y = t.translate_y(bbox.center_y());

        canvas.draw_circle(x, y, FACE_POSITION_RADIUS, self.color);
        if let Some(id) = face.tracking_id {
            canvas.draw_text(
                &format!("id: {id}"),
                x + ID_X_OFFSET,
                y + ID_Y_OFFSET,
                ID_TEXT_SIZE,
                self.color,
            );
        }

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

        for point in face.all_contour_points() {
            canvas.draw_circle(
                t.translate_x(point.x),
                t.translate_y(point.y),
                FACE_POSITION_RADIUS,
                self.color,
            );
        }

        let labels = [
            (face.smiling_probability, "happiness", x + ID_X_OFFSET * 3.0, y - ID_Y_OFFSET),
            (face.right_eye_open_probability, "right eye", x - ID_X_OFFSET, y),
            (face.left_eye_open_probability, "left eye", x + ID_X_OFFSET * 6.0, y),
        ];
        for (value, name, lx, ly) in labels {
            if let Some(p) = value {
                canvas.draw_text(&format!("{name}: {p:.2}"), lx, ly, ID_TEXT_SIZE, self.color);
            }
        }
    }
}

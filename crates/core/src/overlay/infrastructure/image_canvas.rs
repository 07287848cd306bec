use std::path::Path;
use std::sync::Arc;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::overlay::domain::canvas::{opaque, Canvas, Color};

use super::overlay_error::OverlayError;

/// Loads a TrueType/OpenType font for overlay labels.
pub fn load_font(path: &Path) -> Result<FontVec, OverlayError> {
    let bytes = std::fs::read(path).map_err(|source| OverlayError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    FontVec::try_from_vec(bytes).map_err(|_| OverlayError::InvalidFont(path.to_path_buf()))
}

/// Rasterizing canvas backed by an RGBA image.
///
/// Shapes are drawn with `imageproc`. Text needs a font; without one,
/// labels are skipped.
pub struct ImageCanvas {
    image: RgbaImage,
    font: Option<Arc<FontVec>>,
}

impl ImageCanvas {
    /// Transparent canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<Arc<FontVec>>) -> Self {
        self.font = font;
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl Canvas for ImageCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn draw_image(&mut self, image: &RgbImage) {
        let (w, h) = self.image.dimensions();
        let resized;
        let source = if image.dimensions() == (w, h) {
            image
        } else {
            resized = imageops::resize(image, w, h, FilterType::Triangle);
            &resized
        };
        for (dst, src) in self.image.pixels_mut().zip(source.pixels()) {
            *dst = opaque(*src);
        }
    }

    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        draw_filled_circle_mut(
            &mut self.image,
            (cx.round() as i32, cy.round() as i32),
            radius.round().max(1.0) as i32,
            color,
        );
    }

    fn draw_text(&mut self, text: &str, x: f32, baseline_y: f32, size: f32, color: Color) {
        let Some(font) = self.font.as_deref() else {
            return;
        };
        let scale = PxScale::from(size);
        let ascent = font.as_scaled(scale).ascent();
        let top = (baseline_y - ascent).round() as i32;
        draw_text_mut(&mut self.image, color, x.round() as i32, top, scale, font, text);
    }

    fn draw_rect(
        &mut self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        stroke_width: f32,
        color: Color,
    ) {
        let stroke = stroke_width.round().max(1.0) as i32;
        let (l, t) = (left.round() as i32, top.round() as i32);
        let (w, h) = ((right - left).round() as i32, (bottom - top).round() as i32);
        // Center the stroke on the outline, one hollow rect per pixel of width
        for inset in (0..stroke).map(|i| i - stroke / 2) {
            let (rw, rh) = (w - 2 * inset, h - 2 * inset);
            if rw <= 0 || rh <= 0 {
                continue;
            }
            let rect = Rect::at(l + inset, t + inset).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    fn draw_bitmap(&mut self, bitmap: &RgbaImage, left: i32, top: i32, right: i32, bottom: i32) {
        let (w, h) = (right - left, bottom - top);
        if w <= 0 || h <= 0 {
            return;
        }
        let scaled = imageops::resize(bitmap, w as u32, h as u32, FilterType::Triangle);
        imageops::overlay(&mut self.image, &scaled, left as i64, top as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::domain::canvas::WHITE;
    use image::Rgb;

    #[test]
    fn test_new_canvas_is_transparent() {
        let canvas = ImageCanvas::new(8, 4);
        assert_eq!((canvas.width(), canvas.height()), (8, 4));
        assert!(canvas.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_draw_image_stretches_to_canvas() {
        let mut canvas = ImageCanvas::new(4, 4);
        let source = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));

        canvas.draw_image(&source);

        assert!(canvas.image().pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn test_draw_circle_fills_center() {
        let mut canvas = ImageCanvas::new(20, 20);
        canvas.draw_circle(10.0, 10.0, 4.0, WHITE);

        assert_eq!(*canvas.image().get_pixel(10, 10), WHITE);
        assert_eq!(canvas.image().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_draw_rect_strokes_outline_only() {
        let mut canvas = ImageCanvas::new(40, 40);
        canvas.draw_rect(10.0, 10.0, 30.0, 30.0, 3.0, WHITE);

        assert_eq!(*canvas.image().get_pixel(10, 20), WHITE);
        assert_eq!(*canvas.image().get_pixel(9, 20), WHITE);
        assert_eq!(*canvas.image().get_pixel(11, 20), WHITE);
        assert_eq!(canvas.image().get_pixel(20, 20).0[3], 0);
    }

    #[test]
    fn test_draw_bitmap_scales_into_rect() {
        let mut canvas = ImageCanvas::new(20, 20);
        let bitmap = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));

        canvas.draw_bitmap(&bitmap, 5, 5, 15, 15);

        assert_eq!(canvas.image().get_pixel(10, 10).0, [255, 0, 0, 255]);
        assert_eq!(canvas.image().get_pixel(4, 4).0[3], 0);
        assert_eq!(canvas.image().get_pixel(15, 15).0[3], 0);
    }

    #[test]
    fn test_degenerate_shapes_are_ignored() {
        let mut canvas = ImageCanvas::new(10, 10);
        canvas.draw_bitmap(&RgbaImage::new(2, 2), 5, 5, 5, 9);
        canvas.draw_rect(3.0, 3.0, 3.0, 3.0, 1.0, WHITE);
        assert!(canvas.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut canvas = ImageCanvas::new(50, 50);
        canvas.draw_text("id: 1", 5.0, 30.0, 30.0, WHITE);
        assert!(canvas.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_load_font_rejects_garbage() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();

        let err = load_font(file.path()).unwrap_err();
        assert!(matches!(err, OverlayError::InvalidFont(_)));
    }

    #[test]
    fn test_load_font_missing_file() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, OverlayError::FontRead { .. }));
    }
}

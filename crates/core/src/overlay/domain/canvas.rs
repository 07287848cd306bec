use image::{Rgb, Rgba, RgbaImage, RgbImage};

pub type Color = Rgba<u8>;

pub const WHITE: Color = Rgba([255, 255, 255, 255]);

/// Drawing surface for overlay graphics.
///
/// Coordinates are view pixels as floats; implementations round as needed.
/// Text is positioned by its baseline.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Draws `image` stretched over the whole canvas.
    fn draw_image(&mut self, image: &RgbImage);

    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color);

    fn draw_text(&mut self, text: &str, x: f32, baseline_y: f32, size: f32, color: Color);

    /// Stroked rectangle outline.
    fn draw_rect(
        &mut self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        stroke_width: f32,
        color: Color,
    );

    /// Draws `bitmap` scaled into the destination rectangle.
    fn draw_bitmap(&mut self, bitmap: &RgbaImage, left: i32, top: i32, right: i32, bottom: i32);
}

/// Opaque RGBA version of an RGB pixel.
pub fn opaque(pixel: Rgb<u8>) -> Color {
    Rgba([pixel[0], pixel[1], pixel[2], 255])
}

use image::{RgbImage, RgbaImage};
use serde::Serialize;

use crate::overlay::domain::canvas::{Canvas, Color};

/// One recorded drawing call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Image {
        width: u32,
        height: u32,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        color: [u8; 4],
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        color: [u8; 4],
    },
    Rect {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        stroke_width: f32,
        color: [u8; 4],
    },
    Bitmap {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
}

/// Canvas that records primitives instead of rasterizing them.
///
/// Used to inspect what an overlay would draw and to dump it as JSON.
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Text of every label, in draw order.
    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.ops)
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn draw_image(&mut self, image: &RgbImage) {
        self.ops.push(DrawOp::Image {
            width: image.width(),
            height: image.height(),
        });
    }

    fn draw_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        self.ops.push(DrawOp::Circle {
            cx,
            cy,
            radius,
            color: color.0,
        });
    }

    fn draw_text(&mut self, text: &str, x: f32, baseline_y: f32, size: f32, color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y: baseline_y,
            size,
            color: color.0,
        });
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
        self.ops.push(DrawOp::Rect {
            left,
            top,
            right,
            bottom,
            stroke_width,
            color: color.0,
        });
    }

    fn draw_bitmap(&mut self, _bitmap: &RgbaImage, left: i32, top: i32, right: i32, bottom: i32) {
        self.ops.push(DrawOp::Bitmap {
            left,
            top,
            right,
            bottom,
        });
    }
}

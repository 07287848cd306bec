//! Pixel layouts delivered by frame sources and the conversions the
//! pipeline needs to turn them into upright RGB.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Tightly packed 8-bit RGB, row-major.
    Rgb24,
    /// Full-resolution Y plane followed by interleaved V/U at quarter resolution.
    Nv21,
}

impl PixelFormat {
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        match self {
            PixelFormat::Rgb24 => w * h * 3,
            PixelFormat::Nv21 => w * h + chroma_stride(w) * h.div_ceil(2),
        }
    }
}

/// Bytes per interleaved V/U row.
fn chroma_stride(width: usize) -> usize {
    width.div_ceil(2) * 2
}

/// Converts an NV21 buffer to packed RGB using BT.601 full-range coefficients.
pub fn nv21_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let uv_base = w * h;
    let uv_stride = chroma_stride(w);

    let mut rgb = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        let uv_row = uv_base + (y / 2) * uv_stride;
        for x in 0..w {
            let luma = data[y * w + x] as f32;
            let uv = uv_row + (x / 2) * 2;
            let v = data[uv] as f32 - 128.0;
            let u = data[uv + 1] as f32 - 128.0;

            rgb.push(clamp_u8(luma + 1.402 * v));
            rgb.push(clamp_u8(luma - 0.344_136 * u - 0.714_136 * v));
            rgb.push(clamp_u8(luma + 1.772 * u));
        }
    }
    rgb
}

/// Converts packed RGB to NV21, averaging chroma over each 2x2 block.
pub fn rgb_to_nv21(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let uv_stride = chroma_stride(w);
    let mut out = vec![0u8; PixelFormat::Nv21.buffer_len(width, height)];

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 3;
            let (r, g, b) = (data[i] as f32, data[i + 1] as f32, data[i + 2] as f32);
            out[y * w + x] = clamp_u8(0.299 * r + 0.587 * g + 0.114 * b);
        }
    }

    for by in 0..h.div_ceil(2) {
        for bx in 0..w.div_ceil(2) {
            let (mut u_sum, mut v_sum, mut n) = (0.0f32, 0.0f32, 0.0f32);
            for y in (by * 2)..((by * 2 + 2).min(h)) {
                for x in (bx * 2)..((bx * 2 + 2).min(w)) {
                    let i = (y * w + x) * 3;
                    let (r, g, b) = (data[i] as f32, data[i + 1] as f32, data[i + 2] as f32);
                    u_sum += -0.168_736 * r - 0.331_264 * g + 0.5 * b;
                    v_sum += 0.5 * r - 0.418_688 * g - 0.081_312 * b;
                    n += 1.0;
                }
            }
            let uv = w * h + by * uv_stride + bx * 2;
            out[uv] = clamp_u8(v_sum / n + 128.0);
            out[uv + 1] = clamp_u8(u_sum / n + 128.0);
        }
    }
    out
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

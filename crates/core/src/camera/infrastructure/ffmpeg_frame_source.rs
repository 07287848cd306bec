use std::path::PathBuf;

use crate::camera::domain::frame_source::{CameraInfo, FrameSource};
use crate::shared::frame::Frame;
use crate::shared::frame_metadata::{CameraFacing, FrameMetadata, Rotation};
use crate::shared::pixel_format::PixelFormat;

/// Plays a video file (or any input ffmpeg can open) as a camera.
///
/// Frames are delivered as NV21, the layout camera previews hand out, and
/// tagged with the rotation found in the stream's display matrix. A second
/// input can stand in for the front camera; without one, the same input is
/// reused and only the facing tag changes.
pub struct FfmpegFrameSource {
    back_input: PathBuf,
    front_input: Option<PathBuf>,
    state: Option<DecodeState>,
}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    metadata: FrameMetadata,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: FfmpegFrameSource is only used from one thread at a time (the
// capture thread). The raw pointers inside ffmpeg types are not shared.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new(input: PathBuf) -> Self {
        Self {
            back_input: input,
            front_input: None,
            state: None,
        }
    }

    pub fn with_front_input(mut self, input: Option<PathBuf>) -> Self {
        self.front_input = input;
        self
    }

    fn input_for(&self, facing: CameraFacing) -> &PathBuf {
        match (facing, self.front_input.as_ref()) {
            (CameraFacing::Front, Some(front)) => front,
            _ => &self.back_input,
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, facing: CameraFacing) -> Result<CameraInfo, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.state = None;

        let path = self.input_for(facing).clone();
        let ictx = ffmpeg_next::format::input(&path)
            .map_err(|e| format!("Cannot open {}: {e}", path.display()))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            Some(rate.numerator() as f64 / rate.denominator() as f64)
        } else {
            None
        };
        let rotation = Rotation::from_degrees(extract_rotation(&stream));

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::NV21,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = FrameMetadata::new(width, height)
            .with_rotation(rotation)
            .with_facing(facing);
        log::debug!(
            "Opened {} ({}x{}, {:?}, fps {:?})",
            path.display(),
            width,
            height,
            rotation,
            fps
        );

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            metadata,
            frame_index: 0,
            flushing: false,
            done: false,
        });

        Ok(CameraInfo {
            width,
            height,
            fps,
            rotation,
            facing,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegFrameSource: not opened")?;
        state.next_frame()
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl DecodeState {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(None);
        }
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                let frame = self.try_receive()?;
                self.done = frame.is_none();
                return Ok(frame);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut nv21 = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut nv21)?;

        let pixels = extract_nv21_planes(&nv21, self.metadata.width, self.metadata.height);
        let frame = Frame::new(pixels, self.metadata, PixelFormat::Nv21, self.frame_index)?;
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Copies the Y plane and the interleaved VU plane into one tightly packed
/// NV21 buffer, dropping ffmpeg's row padding.
fn extract_nv21_planes(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let chroma_row = w.div_ceil(2) * 2;
    let chroma_rows = h.div_ceil(2);

    let mut pixels = Vec::with_capacity(w * h + chroma_row * chroma_rows);
    copy_rows(&mut pixels, frame.data(0), frame.stride(0), w, h);
    copy_rows(&mut pixels, frame.data(1), frame.stride(1), chroma_row, chroma_rows);
    pixels
}

fn copy_rows(dst: &mut Vec<u8>, plane: &[u8], stride: usize, row_len: usize, rows: usize) {
    for row in 0..rows {
        let start = row * stride;
        dst.extend_from_slice(&plane[start..start + row_len]);
    }
}

/// Extracts the rotation angle from a video stream.
///
/// Tries stream side data (DisplayMatrix) first, then falls back to the
/// `"rotate"` metadata tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return angle;
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

/// Parses a 3x3 display matrix (9 x i32, 16.16 fixed-point, little-endian)
/// into a clockwise rotation in degrees.
///
/// The matrix describes the transform needed for display, so the angle of
/// its first row vector is negated.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    Some(-m10.atan2(m00).to_degrees().round() as i32)
}

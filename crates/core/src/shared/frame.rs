use image::{imageops, RgbImage};
use ndarray::ArrayView3;
use thiserror::Error;

use crate::shared::frame_metadata::{FrameMetadata, Rotation};
use crate::shared::pixel_format::{nv21_to_rgb, PixelFormat};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height} {format:?}")]
    BufferSize {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    #[error("operation requires an RGB frame, got {0:?}")]
    NotRgb(PixelFormat),
}

/// One camera-captured image plus its capture metadata.
///
/// Sources hand frames over in whatever layout the device produces; the
/// pipeline converts to upright RGB right before detection.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    metadata: FrameMetadata,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        metadata: FrameMetadata,
        format: PixelFormat,
        index: usize,
    ) -> Result<Self, FrameError> {
        let expected = format.buffer_len(metadata.width, metadata.height);
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: data.len(),
                width: metadata.width,
                height: metadata.height,
                format,
            });
        }
        Ok(Self {
            data,
            metadata,
            format,
            index,
        })
    }

    /// Upright RGB frame with no facing information.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32, index: usize) -> Result<Self, FrameError> {
        Self::new(data, FrameMetadata::new(width, height), PixelFormat::Rgb24, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.metadata.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Decodes to RGB and applies the capture rotation.
    ///
    /// The result carries `Rotation::Deg0` and the swapped dimensions, so
    /// detector coordinates line up with what the preview shows.
    pub fn to_upright_rgb(&self) -> Frame {
        let (width, height) = (self.metadata.width, self.metadata.height);
        let rgb = match self.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Nv21 => nv21_to_rgb(&self.data, width, height),
        };
        // Length was validated at construction.
        let image = RgbImage::from_raw(width, height, rgb).expect("validated RGB frame length");
        let upright = match self.metadata.rotation {
            Rotation::Deg0 => image,
            Rotation::Deg90 => imageops::rotate90(&image),
            Rotation::Deg180 => imageops::rotate180(&image),
            Rotation::Deg270 => imageops::rotate270(&image),
        };
        Frame {
            metadata: FrameMetadata {
                width: upright.width(),
                height: upright.height(),
                rotation: Rotation::Deg0,
                camera_facing: self.metadata.camera_facing,
            },
            data: upright.into_raw(),
            format: PixelFormat::Rgb24,
            index: self.index,
        }
    }

    /// (height, width, channel) view over an RGB frame.
    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, FrameError> {
        if self.format != PixelFormat::Rgb24 {
            return Err(FrameError::NotRgb(self.format));
        }
        let shape = (self.height() as usize, self.width() as usize, 3);
        // Length was validated at construction.
        Ok(ArrayView3::from_shape(shape, &self.data).expect("validated RGB frame length"))
    }

    /// Converts an RGB frame into an `image` buffer for drawing.
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        let upright;
        let source = if self.format == PixelFormat::Rgb24 && self.metadata.rotation == Rotation::Deg0 {
            self
        } else {
            upright = self.to_upright_rgb();
            &upright
        };
        RgbImage::from_raw(source.width(), source.height(), source.data.clone()).ok_or(
            FrameError::BufferSize {
                expected: PixelFormat::Rgb24.buffer_len(source.width(), source.height()),
                actual: source.data.len(),
                width: source.width(),
                height: source.height(),
                format: PixelFormat::Rgb24,
            },
        )
    }
}

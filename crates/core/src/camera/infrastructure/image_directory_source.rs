use std::path::{Path, PathBuf};

use crate::camera::domain::frame_source::{CameraInfo, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::frame_metadata::{CameraFacing, FrameMetadata, Rotation};
use crate::shared::pixel_format::PixelFormat;

/// Feeds still images as camera frames, in file-name order.
///
/// Accepts a single image or a directory of images. Frames are upright RGB
/// and may differ in size; the reported camera info is that of the first
/// image.
pub struct ImageDirectorySource {
    input: PathBuf,
    fps: Option<f64>,
    facing: CameraFacing,
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageDirectorySource {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            fps: None,
            facing: CameraFacing::default(),
            paths: Vec::new(),
            cursor: 0,
        }
    }

    /// Rate used when capture is paced in realtime.
    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    fn load(&self, path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)
            .map_err(|e| format!("Cannot read image {}: {e}", path.display()))?
            .to_rgb8();
        let metadata = FrameMetadata::new(img.width(), img.height()).with_facing(self.facing);
        Ok(Frame::new(img.into_raw(), metadata, PixelFormat::Rgb24, index)?)
    }
}

/// Returns true if the path has a supported still-image extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn list_images(input: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(input)
        .map_err(|e| format!("Cannot read directory {}: {e}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image_path(p))
        .collect();
    paths.sort();
    Ok(paths)
}

impl FrameSource for ImageDirectorySource {
    fn open(&mut self, facing: CameraFacing) -> Result<CameraInfo, Box<dyn std::error::Error>> {
        let paths = list_images(&self.input)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", self.input.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        log::debug!("Found {} images in {}", paths.len(), self.input.display());
        self.paths = paths;
        self.cursor = 0;
        self.facing = facing;

        Ok(CameraInfo {
            width,
            height,
            fps: self.fps,
            rotation: Rotation::Deg0,
            facing,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let frame = self.load(path, self.cursor)?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.paths.clear();
        self.cursor = 0;
    }
}

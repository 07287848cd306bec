use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use ab_glyph::FontVec;
use crossbeam_channel::Receiver;

use crate::overlay::domain::graphic_overlay::GraphicOverlay;

use super::image_canvas::ImageCanvas;
use super::overlay_error::OverlayError;

/// Image sink standing in for an on-screen view.
///
/// Every render rasterizes the overlay at its view size and writes
/// `overlay_<generation>.png` into the output directory.
pub struct PngSurface {
    output_dir: PathBuf,
    font: Option<Arc<FontVec>>,
}

impl PngSurface {
    pub fn new(output_dir: &Path, font: Option<Arc<FontVec>>) -> Result<Self, OverlayError> {
        std::fs::create_dir_all(output_dir).map_err(|source| OverlayError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            font,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Draws the overlay's current graphics and writes one PNG.
    pub fn render(&self, overlay: &GraphicOverlay, generation: u64) -> Result<PathBuf, OverlayError> {
        let (width, height) = overlay.view_size();
        let mut canvas = ImageCanvas::new(width.max(1), height.max(1)).with_font(self.font.clone());
        overlay.draw(&mut canvas);

        let path = self.output_dir.join(format!("overlay_{generation:06}.png"));
        canvas
            .into_image()
            .save(&path)
            .map_err(|source| OverlayError::Write {
                path: path.clone(),
                source,
            })?;
        log::debug!("Rendered overlay generation {generation} to {}", path.display());
        Ok(path)
    }

    /// Renders on a background thread each time the overlay is invalidated.
    ///
    /// Runs until `invalidations` disconnects (see
    /// [`GraphicOverlay::unsubscribe`]) and returns the number of images written.
    pub fn spawn(
        self,
        overlay: Arc<GraphicOverlay>,
        invalidations: Receiver<u64>,
    ) -> JoinHandle<Result<usize, OverlayError>> {
        std::thread::spawn(move || {
            let mut written = 0;
            for generation in invalidations {
                self.render(&overlay, generation)?;
                written += 1;
            }
            Ok(written)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face::Face;
    use crate::overlay::domain::face_graphic::FaceGraphic;
    use crate::shared::frame_metadata::CameraFacing;
    use crate::shared::geometry::BoundingBox;
    use tempfile::TempDir;

    fn overlay_with_face() -> GraphicOverlay {
        let overlay = GraphicOverlay::new();
        overlay.set_camera_info(64, 48, CameraFacing::Back);
        overlay.add(Box::new(FaceGraphic::new(
            Face::new(BoundingBox::new(10, 10, 40, 40)),
            CameraFacing::Back,
            None,
        )));
        overlay
    }

    #[test]
    fn test_render_writes_png_at_view_size() {
        let tmp = TempDir::new().unwrap();
        let surface = PngSurface::new(&tmp.path().join("out"), None).unwrap();

        let path = surface.render(&overlay_with_face(), 7).unwrap();

        assert!(path.ends_with("overlay_000007.png"));
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    #[test]
    fn test_spawned_surface_renders_on_invalidate() {
        let tmp = TempDir::new().unwrap();
        let surface = PngSurface::new(tmp.path(), None).unwrap();
        let overlay = Arc::new(overlay_with_face());
        let rx = overlay.subscribe();
        let handle = surface.spawn(Arc::clone(&overlay), rx);

        overlay.post_invalidate();
        // Wait for the render before disconnecting so the notification is consumed
        let expected = tmp.path().join("overlay_000001.png");
        for _ in 0..200 {
            if expected.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        overlay.unsubscribe();

        assert_eq!(handle.join().unwrap().unwrap(), 1);
        assert!(expected.exists());
    }
}

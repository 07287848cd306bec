use std::path::Path;

use image::RgbaImage;

use super::overlay_error::OverlayError;

/// Loads the decorative bitmap drawn over each face's nose base.
pub fn load_overlay_bitmap(path: &Path) -> Result<RgbaImage, OverlayError> {
    let bitmap = image::open(path)
        .map_err(|source| OverlayError::Bitmap {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    log::debug!(
        "Loaded overlay bitmap {} ({}x{})",
        path.display(),
        bitmap.width(),
        bitmap.height()
    );
    Ok(bitmap)
}

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Directory name used under the platform cache/config roots.
pub const APP_DIR_NAME: &str = "FaceOverlay";

pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Frame rate assumed for sources that do not report one.
pub const DEFAULT_SOURCE_FPS: f64 = 30.0;

/// Frames a tracked face may go unmatched before its id is retired.
pub const TRACKER_MAX_LOST: usize = 15;

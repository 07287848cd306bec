pub mod bitmap_loader;
pub mod image_canvas;
pub mod overlay_error;
pub mod png_surface;
pub mod recording_canvas;

pub mod constants;
pub mod frame;
pub mod frame_metadata;
pub mod geometry;
pub mod pixel_format;

pub mod camera_source;
pub mod domain;
pub mod infrastructure;

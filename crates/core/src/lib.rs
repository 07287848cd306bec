pub mod camera;
pub mod detection;
pub mod overlay;
pub mod pipeline;
pub mod settings;
pub mod shared;

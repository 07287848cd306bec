pub mod detector_options;
pub mod face;
pub mod face_detector;

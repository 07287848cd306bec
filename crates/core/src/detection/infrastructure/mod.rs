pub mod detector_factory;
mod execution_provider;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod replay_face_detector;
pub mod tracking_face_detector;

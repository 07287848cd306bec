pub mod frame_processor;
pub mod frame_throttle;
pub mod pipeline_logger;
pub mod presenter;

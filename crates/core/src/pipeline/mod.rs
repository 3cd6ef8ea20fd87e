pub mod estimate_frame_use_case;
pub mod live_estimation_use_case;
pub mod pipeline_logger;

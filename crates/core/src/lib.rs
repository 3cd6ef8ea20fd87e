pub mod annotation;
pub mod cropping;
pub mod detection;
pub mod estimation;
pub mod persistence;
pub mod pipeline;
pub mod shared;
pub mod video;

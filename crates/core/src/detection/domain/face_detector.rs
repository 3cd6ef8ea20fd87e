use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face detection.
///
/// Takes a single-channel frame and returns face rectangles in detector
/// order. Every rectangle must be non-empty and lie inside the frame;
/// downstream cropping relies on it. Implementations may keep scratch
/// state between calls, hence `&mut self`.
pub trait FaceDetector {
    fn detect(&mut self, gray: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}

use crate::estimation::domain::labeled_face::LabeledFace;
use crate::shared::frame::Frame;

/// Draws estimation results onto a frame in place.
pub trait FrameAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        faces: &[LabeledFace],
    ) -> Result<(), Box<dyn std::error::Error>>;
}

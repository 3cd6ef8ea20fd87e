use crate::shared::region::Region;

use super::label::Label;

/// Everything known about one face in one frame.
///
/// `region` is the margin-expanded area the crop was taken from; the label
/// is drawn at `detection`'s top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabeledFace {
    pub detection: Region,
    pub region: Region,
    pub label: Label,
}

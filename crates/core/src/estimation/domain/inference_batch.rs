use ndarray::{stack, Array4, ArrayView3, Axis, ShapeError};
use thiserror::Error;

use crate::cropping::domain::region_extractor::Crop;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("inference batch must contain at least one crop")]
    Empty,
    #[error("crops have mismatched shapes: {0}")]
    Shape(#[from] ShapeError),
}

/// One frame's face crops stacked as `N × size × size × channels`.
///
/// Position `i` holds the crop of the frame's `i`-th detection.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceBatch {
    images: Array4<u8>,
}

impl InferenceBatch {
    pub fn from_crops(crops: &[Crop]) -> Result<Self, BatchError> {
        if crops.is_empty() {
            return Err(BatchError::Empty);
        }
        let views: Vec<ArrayView3<'_, u8>> = crops.iter().map(|c| c.pixels.view()).collect();
        let images = stack(Axis(0), &views)?;
        Ok(Self { images })
    }

    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Crop edge length in pixels.
    pub fn image_size(&self) -> usize {
        self.images.len_of(Axis(1))
    }

    pub fn images(&self) -> &Array4<u8> {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::region::Region;
    use ndarray::Array3;

    fn crop(value: u8, size: usize) -> Crop {
        Crop {
            pixels: Array3::from_elem((size, size, 3), value),
            region: Region::new(0, 0, size as i32, size as i32),
        }
    }

    #[test]
    fn test_stacks_in_order() {
        let batch = InferenceBatch::from_crops(&[crop(1, 4), crop(2, 4), crop(3, 4)]).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.image_size(), 4);
        assert_eq!(batch.images().dim(), (3, 4, 4, 3));
        assert_eq!(batch.images()[[0, 0, 0, 0]], 1);
        assert_eq!(batch.images()[[1, 3, 3, 2]], 2);
        assert_eq!(batch.images()[[2, 1, 2, 0]], 3);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(InferenceBatch::from_crops(&[]), Err(BatchError::Empty)));
    }

    #[test]
    fn test_mismatched_sizes_rejected() {
        let result = InferenceBatch::from_crops(&[crop(0, 4), crop(0, 5)]);
        assert!(matches!(result, Err(BatchError::Shape(_))));
    }
}

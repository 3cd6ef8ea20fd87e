use ndarray::{Array1, Array2};

use super::inference_batch::InferenceBatch;

/// Raw model output for one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictorOutput {
    /// Probability that face `i` is female, one entry per batch position.
    pub female_scores: Array1<f32>,
    /// `N × 101` age weights; column `a` is the weight of age `a` years.
    pub age_distributions: Array2<f32>,
}

/// Domain interface for the age/gender model.
///
/// Called once per frame with every crop of that frame; never with an
/// empty batch.
pub trait AgeGenderPredictor {
    fn predict(
        &mut self,
        batch: &InferenceBatch,
    ) -> Result<PredictorOutput, Box<dyn std::error::Error>>;
}

use std::fmt;

use ndarray::ArrayView1;
use thiserror::Error;

use crate::shared::constants::{AGE_CLASSES, FEMALE_THRESHOLD};

use super::age_gender_predictor::PredictorOutput;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Female only when the score is strictly above the threshold.
    pub fn from_female_score(score: f32) -> Self {
        if score > FEMALE_THRESHOLD {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded estimate for one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    pub age: u32,
    pub gender: Gender,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.age, self.gender)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("predictor returned {got} {what} for a batch of {expected}")]
    BatchMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("age distribution has {0} classes, expected {expected}", expected = AGE_CLASSES)]
    AgeClasses(usize),
    #[error("non-finite predictor output at batch position {0}")]
    NonFinite(usize),
}

/// Expected age under a distribution indexed by age in years.
pub fn expected_age(distribution: ArrayView1<'_, f32>) -> f64 {
    distribution
        .iter()
        .enumerate()
        .map(|(age, &w)| age as f64 * w as f64)
        .sum()
}

/// Turns model output into one label per batch position.
///
/// Age is the distribution's expectation truncated towards zero, not its
/// mode. Output whose shape disagrees with `batch_len` is rejected whole.
pub fn decode_labels(output: &PredictorOutput, batch_len: usize) -> Result<Vec<Label>, DecodeError> {
    let scores = &output.female_scores;
    let ages = &output.age_distributions;

    if scores.len() != batch_len {
        return Err(DecodeError::BatchMismatch {
            what: "gender scores",
            expected: batch_len,
            got: scores.len(),
        });
    }
    if ages.nrows() != batch_len {
        return Err(DecodeError::BatchMismatch {
            what: "age distributions",
            expected: batch_len,
            got: ages.nrows(),
        });
    }
    if ages.ncols() != AGE_CLASSES {
        return Err(DecodeError::AgeClasses(ages.ncols()));
    }

    scores
        .iter()
        .zip(ages.rows())
        .enumerate()
        .map(|(i, (&score, dist))| {
            let mean = expected_age(dist);
            if !score.is_finite() || !mean.is_finite() {
                return Err(DecodeError::NonFinite(i));
            }
            Ok(Label {
                age: mean.floor().clamp(0.0, (AGE_CLASSES - 1) as f64) as u32,
                gender: Gender::from_female_score(score),
            })
        })
        .collect()
}

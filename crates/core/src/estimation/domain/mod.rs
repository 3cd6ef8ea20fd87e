pub mod age_gender_predictor;
pub mod inference_batch;
pub mod label;
pub mod labeled_face;

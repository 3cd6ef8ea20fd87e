//! Age/gender estimator running an exported WideResNet-style model through
//! ONNX Runtime via `ort`.
//!
//! The model takes raw 0-255 float pixels and produces two outputs: a
//! gender head (`N × 2` softmax with column 0 = female, or `N × 1`) and a
//! 101-way age softmax. Outputs are told apart by width, not position.

use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, Array4, Axis, Ix2};

use crate::estimation::domain::age_gender_predictor::{AgeGenderPredictor, PredictorOutput};
use crate::estimation::domain::inference_batch::InferenceBatch;
use crate::shared::constants::AGE_CLASSES;

/// Pixel channel order the model was trained with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// OpenCV-style; crops are swapped from RGB before inference.
    Bgr,
}

impl FromStr for ChannelOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(ChannelOrder::Rgb),
            "bgr" => Ok(ChannelOrder::Bgr),
            other => Err(format!("Channel order must be 'rgb' or 'bgr', got '{other}'")),
        }
    }
}

/// Memory layout of the model input tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputLayout {
    Nhwc,
    Nchw,
}

pub struct OnnxAgeGenderPredictor {
    session: ort::session::Session,
    channel_order: ChannelOrder,
    layout: InputLayout,
    /// Crop edge length the model declares, when it is not dynamic.
    input_size: Option<usize>,
}

impl OnnxAgeGenderPredictor {
    /// Loads the model and reads its input layout and crop size from the
    /// declared input shape. Keras exports are NHWC (`[N, S, S, 3]`).
    pub fn new(
        model_path: &Path,
        channel_order: ChannelOrder,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(platform_providers())?
            .commit_from_file(model_path)?;

        let dims: Vec<i64> = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
                _ => None,
            })
            .unwrap_or_default();
        let layout = input_layout(&dims);
        let spatial = match layout {
            InputLayout::Nhwc => dims.get(1),
            InputLayout::Nchw => dims.get(2),
        };
        let input_size = spatial.copied().filter(|&d| d > 0).map(|d| d as usize);

        log::info!(
            "Age/gender model loaded from {} ({:?} input, {:?} channels)",
            model_path.display(),
            layout,
            channel_order
        );

        Ok(Self {
            session,
            channel_order,
            layout,
            input_size,
        })
    }
}

impl AgeGenderPredictor for OnnxAgeGenderPredictor {
    fn predict(
        &mut self,
        batch: &InferenceBatch,
    ) -> Result<PredictorOutput, Box<dyn std::error::Error>> {
        if let Some(size) = self.input_size {
            if size != batch.image_size() {
                return Err(format!(
                    "Model expects {size}x{size} crops, got {}x{}",
                    batch.image_size(),
                    batch.image_size()
                )
                .into());
            }
        }
        let tensor = to_input_tensor(batch, self.channel_order, self.layout);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() < 2 {
            return Err(format!(
                "Age/gender model produced {} outputs, expected 2",
                outputs.len()
            )
            .into());
        }

        let first = outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix2>()?
            .to_owned();
        let second = outputs[1]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix2>()?
            .to_owned();

        split_heads(first, second)
    }
}

/// CoreML on macOS, DirectML on Windows; ONNX Runtime keeps CPU as fallback.
fn platform_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[allow(unused_mut)]
    let mut providers = Vec::new();
    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());
    providers
}

// ---------------------------------------------------------------------------
// Pre/post-processing
// ---------------------------------------------------------------------------

/// A channel dimension of 3 in position 1 (and not in position 3) means NCHW.
fn input_layout(dims: &[i64]) -> InputLayout {
    if dims.len() == 4 && dims[1] == 3 && dims[3] != 3 {
        InputLayout::Nchw
    } else {
        InputLayout::Nhwc
    }
}

/// Converts the u8 batch to the float tensor the model expects.
fn to_input_tensor(batch: &InferenceBatch, order: ChannelOrder, layout: InputLayout) -> Array4<f32> {
    let mut tensor = batch.images().mapv(|v| v as f32);
    if order == ChannelOrder::Bgr {
        tensor.invert_axis(Axis(3));
    }
    match layout {
        InputLayout::Nhwc => tensor.as_standard_layout().into_owned(),
        InputLayout::Nchw => tensor
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned(),
    }
}

/// Assigns the two model heads to gender and age by their widths.
fn split_heads(
    first: Array2<f32>,
    second: Array2<f32>,
) -> Result<PredictorOutput, Box<dyn std::error::Error>> {
    let (gender, ages) = if second.ncols() == AGE_CLASSES {
        (first, second)
    } else if first.ncols() == AGE_CLASSES {
        (second, first)
    } else {
        return Err(format!(
            "No {AGE_CLASSES}-class age output (widths {} and {})",
            first.ncols(),
            second.ncols()
        )
        .into());
    };

    if gender.ncols() == 0 || gender.ncols() > 2 {
        return Err(format!("Unexpected gender output width {}", gender.ncols()).into());
    }

    Ok(PredictorOutput {
        female_scores: gender.column(0).to_owned(),
        age_distributions: ages,
    })
}

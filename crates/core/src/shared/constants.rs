use std::time::Duration;

/// Edge length of the square face crops fed to the age/gender model.
pub const FACE_SIZE: u32 = 64;

/// Margin added around each detection, as a percentage of its shorter side.
pub const CROP_MARGIN_PERCENT: u32 = 40;

/// Number of age classes in the model's age distribution (ages 0..=100).
pub const AGE_CLASSES: usize = 101;

/// Gender scores strictly above this are decoded as female.
pub const FEMALE_THRESHOLD: f32 = 0.5;

pub const DEFAULT_CSV_PATH: &str = "csv_output.csv";

/// Wait between attempts when the capture is not open or a read failed.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound on a single blocking capture read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Smallest face the detector looks for, in pixels.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 64;

pub const DEFAULT_SCORE_THRESHOLD: f64 = 2.0;

/// Ratio between adjacent pyramid levels (1 / 1.2).
pub const DEFAULT_PYRAMID_SCALE: f32 = 0.833;

pub const DEFAULT_WINDOW_STEP: u32 = 4;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

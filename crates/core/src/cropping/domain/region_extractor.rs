use ndarray::{s, Array3};
use thiserror::Error;

use crate::shared::constants::{CROP_MARGIN_PERCENT, FACE_SIZE};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::area_resize::{area_resize, ResizeError};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("crop target size must be positive")]
    InvalidTargetSize,
    #[error("crop region for {detection:?} is empty in a {frame_w}x{frame_h} frame")]
    EmptyRegion {
        detection: Region,
        frame_w: u32,
        frame_h: u32,
    },
    #[error(transparent)]
    Resize(#[from] ResizeError),
}

/// A fixed-size square face patch plus the frame region it was cut from.
#[derive(Clone, Debug, PartialEq)]
pub struct Crop {
    /// `size × size × channels` pixels.
    pub pixels: Array3<u8>,
    /// Area of the source frame actually sampled, after margin and clamping.
    pub region: Region,
}

/// Turns detector rectangles into margin-expanded, fixed-size crops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionExtractor {
    margin_percent: u32,
    target_size: u32,
}

impl RegionExtractor {
    pub fn new(margin_percent: u32, target_size: u32) -> Result<Self, ExtractError> {
        if target_size == 0 {
            return Err(ExtractError::InvalidTargetSize);
        }
        Ok(Self {
            margin_percent,
            target_size,
        })
    }

    pub fn margin_percent(&self) -> u32 {
        self.margin_percent
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Crops `detection` (or the whole frame when `None`) out of `frame`.
    pub fn extract(&self, frame: &Frame, detection: Option<&Region>) -> Result<Crop, ExtractError> {
        extract_crop(frame, detection, self.margin_percent, self.target_size)
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self {
            margin_percent: CROP_MARGIN_PERCENT,
            target_size: FACE_SIZE,
        }
    }
}

/// Expands `detection` by `margin_percent` of its shorter side on every
/// edge, then pulls the result back inside the frame.
///
/// Clamping runs left, top, right, bottom in that order. A left/top
/// overflow shifts the box instead of truncating it, bounded by `W - 1` /
/// `H - 1`; a right/bottom overflow shifts it back, bounded by `W` / `H`.
/// The differing bounds are intentional and change observable crops.
pub fn margin_region(detection: &Region, margin_percent: u32, frame_w: u32, frame_h: u32) -> Region {
    let (img_w, img_h) = (frame_w as i64, frame_h as i64);
    let (x, y) = (detection.x as i64, detection.y as i64);
    let (w, h) = (detection.width as i64, detection.height as i64);

    let margin = w.min(h) * margin_percent as i64 / 100;
    let mut x_a = x - margin;
    let mut y_a = y - margin;
    let mut x_b = x + w + margin;
    let mut y_b = y + h + margin;

    if x_a < 0 {
        x_b = (x_b - x_a).min(img_w - 1);
        x_a = 0;
    }
    if y_a < 0 {
        y_b = (y_b - y_a).min(img_h - 1);
        y_a = 0;
    }
    if x_b > img_w {
        x_a = (x_a - (x_b - img_w)).max(0);
        x_b = img_w;
    }
    if y_b > img_h {
        y_a = (y_a - (y_b - img_h)).max(0);
        y_b = img_h;
    }

    Region::new(
        x_a as i32,
        y_a as i32,
        (x_b - x_a) as i32,
        (y_b - y_a) as i32,
    )
}

/// Cuts the margin-expanded region out of `frame` and area-resizes it to
/// `target_size × target_size`.
///
/// `detection` must lie inside the frame; detector adapters guarantee it.
pub fn extract_crop(
    frame: &Frame,
    detection: Option<&Region>,
    margin_percent: u32,
    target_size: u32,
) -> Result<Crop, ExtractError> {
    if target_size == 0 {
        return Err(ExtractError::InvalidTargetSize);
    }

    let detection = detection
        .copied()
        .unwrap_or_else(|| Region::full_frame(frame.width(), frame.height()));
    let region = margin_region(&detection, margin_percent, frame.width(), frame.height());
    if region.is_empty() {
        return Err(ExtractError::EmptyRegion {
            detection,
            frame_w: frame.width(),
            frame_h: frame.height(),
        });
    }

    let src = frame.as_ndarray();
    let patch = src.slice(s![
        region.y as usize..region.bottom() as usize,
        region.x as usize..region.right() as usize,
        ..
    ]);
    let size = target_size as usize;

    Ok(Crop {
        pixels: area_resize(patch, size, size)?,
        region,
    })
}

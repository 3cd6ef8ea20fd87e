use fast_image_resize as fr;
use ndarray::{Array3, ArrayView3};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResizeError {
    #[error("cannot resize an empty image ({src_w}x{src_h} -> {dst_w}x{dst_h})")]
    Empty {
        src_w: usize,
        src_h: usize,
        dst_w: usize,
        dst_h: usize,
    },
    #[error("cannot resize {0}-channel pixels")]
    UnsupportedChannels(usize),
    #[error("resize failed: {0}")]
    Backend(String),
}

/// Resamples an `H × W × C` image to `dst_h × dst_w × C` by area averaging.
///
/// Runs a box-filter convolution through `fast_image_resize`: when
/// downscaling every destination pixel is the mean of the source pixels it
/// covers.
pub fn area_resize(
    src: ArrayView3<'_, u8>,
    dst_w: usize,
    dst_h: usize,
) -> Result<Array3<u8>, ResizeError> {
    let (src_h, src_w, channels) = src.dim();
    if src_h == 0 || src_w == 0 || dst_h == 0 || dst_w == 0 {
        return Err(ResizeError::Empty {
            src_w,
            src_h,
            dst_w,
            dst_h,
        });
    }
    let pixel_type = match channels {
        1 => fr::PixelType::U8,
        3 => fr::PixelType::U8x3,
        4 => fr::PixelType::U8x4,
        n => return Err(ResizeError::UnsupportedChannels(n)),
    };

    // Slices of a frame are strided; the resizer wants packed rows.
    let packed: Vec<u8> = src.iter().copied().collect();
    let src_image = fr::images::ImageRef::new(src_w as u32, src_h as u32, &packed, pixel_type)
        .map_err(|e| ResizeError::Backend(e.to_string()))?;
    let mut dst_image = fr::images::Image::new(dst_w as u32, dst_h as u32, pixel_type);

    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box));
    fr::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ResizeError::Backend(e.to_string()))?;

    Array3::from_shape_vec((dst_h, dst_w, channels), dst_image.into_vec())
        .map_err(|e| ResizeError::Backend(e.to_string()))
}

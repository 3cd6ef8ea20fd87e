use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::ArrayView3;

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Captures are RGB (3 channels); the detector input produced by
/// [`Frame::to_grayscale`] has a single channel.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Single-channel luma copy of an RGB frame, keeping the frame index.
    ///
    /// Uses the `image` crate's luma weights. A frame that already has one
    /// channel is returned as a plain copy.
    pub fn to_grayscale(&self) -> Frame {
        if self.channels == 1 {
            return self.clone();
        }
        let rgb = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(self.width, self.height, &self.data[..])
            .expect("Frame data length must match dimensions");
        let gray = image::imageops::grayscale(&rgb).into_raw();
        Frame::new(gray, self.width, self.height, 1, self.index)
    }

    /// Moves the pixel buffer into an `image` RGB buffer.
    ///
    /// Returns `None` for frames that are not 3-channel.
    pub fn into_rgb_image(self) -> Option<RgbImage> {
        if self.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

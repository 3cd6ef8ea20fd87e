use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::estimation::domain::labeled_face::LabeledFace;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// DejaVu Sans Mono, used unless another TrueType font is supplied.
static DEFAULT_FONT: &[u8] = include_bytes!("../../../assets/DejaVuSansMono.ttf");

/// Annotates frames with `imageproc`: a white box over each extracted
/// region and a white `"{age}, {gender}"` label on a black strip just
/// above the detection's top-left corner.
pub struct ImageprocAnnotator {
    font: FontArc,
    font_size: f32,
}

impl ImageprocAnnotator {
    pub fn new(font: FontArc, font_size: f32) -> Self {
        Self { font, font_size }
    }

    /// Labels in the bundled font.
    pub fn with_default_font(font_size: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let font = FontArc::try_from_slice(DEFAULT_FONT)?;
        Ok(Self::new(font, font_size))
    }

    pub fn from_font_file(path: &Path, font_size: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| format!("Invalid font {}: {e}", path.display()))?;
        Ok(Self::new(font, font_size))
    }

    /// Strip size for `text`: its advance width by one full line height,
    /// so descenders stay inside the strip.
    fn label_extent(&self, text: &str) -> (u32, u32) {
        let scale = PxScale::from(self.font_size);
        let (width, _) = text_size(scale, &self.font, text);
        let scaled = self.font.as_scaled(scale);
        let height = (scaled.ascent() - scaled.descent()).ceil().max(0.0) as u32;
        (width, height)
    }

    fn draw_box(&self, canvas: &mut RgbImage, region: &Region) {
        for inset in 0..BOX_THICKNESS {
            let w = region.width - 2 * inset;
            let h = region.height - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(region.x + inset, region.y + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, anchor_x: i32, anchor_y: i32, text: &str) {
        let (text_w, text_h) = self.label_extent(text);
        if text_w == 0 || text_h == 0 {
            return;
        }
        let top = anchor_y - text_h as i32;
        draw_filled_rect_mut(
            canvas,
            Rect::at(anchor_x, top).of_size(text_w, text_h),
            LABEL_BACKGROUND,
        );
        draw_text_mut(
            canvas,
            LABEL_TEXT,
            anchor_x,
            top,
            PxScale::from(self.font_size),
            &self.font,
            text,
        );
    }
}

impl FrameAnnotator for ImageprocAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        faces: &[LabeledFace],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if faces.is_empty() {
            return Ok(());
        }
        if frame.channels() != 3 {
            return Err(format!("Cannot annotate a {}-channel frame", frame.channels()).into());
        }

        let mut canvas = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Frame buffer does not match its dimensions")?;

        // All boxes first so no box is drawn over another face's label.
        for face in faces {
            self.draw_box(&mut canvas, &face.region);
        }
        for face in faces {
            self.draw_label(
                &mut canvas,
                face.detection.x,
                face.detection.y,
                &face.label.to_string(),
            );
        }

        frame.data_mut().copy_from_slice(canvas.as_raw());
        Ok(())
    }
}

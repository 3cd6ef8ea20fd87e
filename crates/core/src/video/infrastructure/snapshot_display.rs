use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};

/// Keeps an image file on disk showing the latest annotated frame.
///
/// Every `every`-th frame (starting with the first) is written to a
/// sibling temp file and renamed over the target, so a viewer polling the
/// file never sees a half-written image.
pub struct SnapshotDisplay {
    path: PathBuf,
    format: image::ImageFormat,
    every: usize,
    shown: usize,
    stop: Arc<AtomicBool>,
}

impl SnapshotDisplay {
    pub fn new(
        path: impl Into<PathBuf>,
        every: usize,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.into();
        if !is_image_path(&path) {
            return Err(format!(
                "Snapshot path must end in one of: {}",
                IMAGE_EXTENSIONS.join(", ")
            )
            .into());
        }
        if every == 0 {
            return Err("Snapshot interval must be at least 1 frame".into());
        }
        let format = image::ImageFormat::from_path(&path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            path,
            format,
            every,
            shown: 0,
            stop,
        })
    }

    fn write(&self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let image = frame
            .clone()
            .into_rgb_image()
            .ok_or("Snapshot frames must be 3-channel RGB")?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        image.save_with_format(&tmp, self.format)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FrameDisplay for SnapshotDisplay {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
        if self.stop_requested() {
            return Ok(DisplayControl::Stop);
        }
        let due = self.shown % self.every == 0;
        self.shown += 1;
        if due {
            self.write(frame)?;
        }
        Ok(DisplayControl::Continue)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        log::info!(
            "Snapshot display closed after {} frames ({})",
            self.shown,
            self.path.display()
        );
    }
}

/// Whether `path` has an extension the snapshot display can write.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::shared::frame::Frame;
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};

/// Display that shows nothing; only relays the stop flag.
pub struct HeadlessDisplay {
    stop: Arc<AtomicBool>,
}

impl HeadlessDisplay {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
        Ok(if self.stop_requested() {
            DisplayControl::Stop
        } else {
            DisplayControl::Continue
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follows_stop_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut display = HeadlessDisplay::new(Arc::clone(&stop));
        let frame = Frame::new(vec![0; 12], 2, 2, 3, 0);

        assert!(!display.stop_requested());
        assert_eq!(display.show(&frame).unwrap(), DisplayControl::Continue);

        stop.store(true, Ordering::SeqCst);
        assert!(display.stop_requested());
        assert_eq!(display.show(&frame).unwrap(), DisplayControl::Stop);
    }
}

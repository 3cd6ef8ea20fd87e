use crate::shared::frame::Frame;

/// What the loop should do after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Stop,
}

/// Presents annotated frames and relays the user's stop request.
pub trait FrameDisplay {
    fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>>;

    /// Polled before each capture read.
    fn stop_requested(&self) -> bool;

    fn close(&mut self);
}

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The source is not open and could not be opened.
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    /// One read failed; the source reopens on the next call.
    #[error("capture read failed: {0}")]
    ReadFailed(String),
    /// End of stream.
    #[error("capture source exhausted")]
    Exhausted,
}

impl CaptureError {
    /// Whether the caller should wait and try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CaptureError::Exhausted)
    }
}

/// Live source of RGB frames (camera, stream or file).
///
/// `read` blocks for at most the implementation's read timeout.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Closes the underlying stream. Safe to call more than once.
    fn release(&mut self);
}

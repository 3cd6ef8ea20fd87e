use std::fmt;

/// Properties of an opened capture stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Zero when the container does not declare a frame rate (live streams).
    pub fps: f64,
    pub codec: String,
    /// File path or stream URL the capture was opened from.
    pub source: String,
}

impl fmt::Display for VideoMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{}", self.source, self.width, self.height)?;
        if self.fps > 0.0 {
            write!(f, " @ {:.2} fps", self.fps)?;
        }
        if !self.codec.is_empty() {
            write!(f, ", {}", self.codec)?;
        }
        write!(f, ")")
    }
}

use crate::estimation::domain::label::Label;

/// Append-only record of every label produced during a session.
pub trait LabelLog {
    /// Appends one row per label, in the given order.
    ///
    /// Called at most once per frame and never with an empty slice.
    fn append(&mut self, labels: &[Label]) -> Result<(), Box<dyn std::error::Error>>;
}

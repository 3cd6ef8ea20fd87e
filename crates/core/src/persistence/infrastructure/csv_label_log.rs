use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::estimation::domain::label::Label;
use crate::persistence::domain::label_log::LabelLog;

/// `age,gender` rows appended to a plain text file.
///
/// The file is opened and closed on every `append`, so rows from earlier
/// frames are on disk even if the process is killed mid-session. There is
/// no header row, and existing content is never truncated.
pub struct CsvLabelLog {
    path: PathBuf,
}

impl CsvLabelLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LabelLog for CsvLabelLog {
    fn append(&mut self, labels: &[Label]) -> Result<(), Box<dyn std::error::Error>> {
        if labels.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        for label in labels {
            writeln!(out, "{},{}", label.age, label.gender)?;
        }
        out.flush()?;
        Ok(())
    }
}

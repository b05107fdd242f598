//! # Tag Vocabulary
//!
//! The label dictionary of a tagger, written in dictionary order so that the
//! line position of a label is its id. The empty label cannot be represented
//! as the first field of a tab-separated line, so it is written as `<>`.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, TagpackError};
use crate::format::write_file;

/// Placeholder written in place of the empty label.
pub const EMPTY_LABEL: &str = "<>";

/// Ordered label dictionary (position = id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary {
    labels: Vec<String>,
}

impl TagVocabulary {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Decode a dictionary of raw byte-string labels.
    pub fn from_bytes<B: AsRef<[u8]>>(labels: &[B]) -> Result<Self> {
        let labels = labels
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                std::str::from_utf8(raw.as_ref())
                    .map(str::to_string)
                    .map_err(|_| TagpackError::Utf8Label { index })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The label as it appears on disk.
    pub fn display_label(label: &str) -> &str {
        if label.is_empty() { EMPTY_LABEL } else { label }
    }

    /// Write the text form: count line, then `label\tid` for every entry.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", self.labels.len())?;
        for (id, label) in self.labels.iter().enumerate() {
            writeln!(writer, "{}\t{}", Self::display_label(label), id)?;
        }
        Ok(())
    }

    /// Write the text form to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_file(path, "write tag vocabulary", |w| self.write(w))?;
        tracing::info!(path = %path.display(), labels = self.len(), "wrote tag vocabulary");
        Ok(())
    }
}

impl From<Vec<String>> for TagVocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

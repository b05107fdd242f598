//! Export configuration and output file naming.

use std::path::{Path, PathBuf};

use crate::error::{Result, TagpackError};

/// Task used when none is given.
pub const DEFAULT_TASK: &str = "wnut17";

/// Configuration for one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Task name, the prefix of every output file
    pub task: String,
    /// Directory receiving vocabulary and embedding files
    pub output_dir: PathBuf,
    /// Trim the start/stop states out of the CRF transition matrix
    pub trim_transitions: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TASK)
    }
}

impl ExportConfig {
    /// Create a configuration writing to the current directory.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output_dir: PathBuf::from("."),
            trim_transitions: false,
        }
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enable or disable CRF transition trimming.
    pub fn with_trim_transitions(mut self, enabled: bool) -> Self {
        self.trim_transitions = enabled;
        self
    }

    /// `<task>.vocab`
    pub fn vocab_path(&self) -> PathBuf {
        self.output_path(format!("{}.vocab", self.task))
    }

    /// `<task>.tag.vocab`
    pub fn tag_vocab_path(&self) -> PathBuf {
        self.output_path(format!("{}.tag.vocab", self.task))
    }

    /// `<task><source>.emb.vocab`
    pub fn embedding_vocab_path(&self, source: &str) -> PathBuf {
        self.output_path(format!("{}{}.emb.vocab", self.task, source))
    }

    /// `<task><source>.emb`
    pub fn embedding_table_path(&self, source: &str) -> PathBuf {
        self.output_path(format!("{}{}.emb", self.task, source))
    }

    /// Create the output directory if it does not exist.
    pub fn ensure_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| TagpackError::io("create output directory", &self.output_dir, e))
    }

    fn output_path(&self, file_name: String) -> PathBuf {
        Path::new(&self.output_dir).join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.task, "wnut17");
        assert!(!config.trim_transitions);
        assert_eq!(config.vocab_path(), Path::new("./wnut17.vocab"));
    }

    #[test]
    fn test_output_names() {
        let config = ExportConfig::new("ner03")
            .with_output_dir("out")
            .with_trim_transitions(true);

        assert!(config.trim_transitions);
        assert_eq!(config.tag_vocab_path(), Path::new("out/ner03.tag.vocab"));
        assert_eq!(
            config.embedding_vocab_path("glove"),
            Path::new("out/ner03glove.emb.vocab")
        );
        assert_eq!(
            config.embedding_table_path("glove"),
            Path::new("out/ner03glove.emb")
        );
    }

    #[test]
    fn test_ensure_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig::new("chunk").with_output_dir(dir.path().join("a/b"));
        config.ensure_output_dir().unwrap();
        assert!(config.output_dir.is_dir());
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while exporting or reading tagpack files.
#[derive(Debug, Error)]
pub enum TagpackError {
    /// Reading or writing a file failed.
    #[error("failed to {stage} {path:?}: {source}")]
    Io {
        /// What was being done when the failure happened (e.g. "write tag vocabulary").
        stage: &'static str,
        /// The file involved.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to a caller-supplied stream failed.
    #[error("failed to {stage}: {source}")]
    Stream {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A packed file, vocabulary or embedding text file is malformed.
    #[error("malformed input: {0}")]
    Format(String),

    /// A parameter cannot be transformed for packing.
    #[error("invalid parameter {name:?}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: String,
        /// Why the parameter was rejected.
        reason: String,
    },

    /// The model exposes no parameters to pack.
    #[error("model has no parameters")]
    EmptyParameters,

    /// The model file is missing an expected structure.
    #[error("model error: {0}")]
    Model(String),

    /// Candle tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(String),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    RegexError(#[from] regex::Error),

    /// A label in the tag dictionary is not valid UTF-8.
    #[error("label at position {index} is not valid UTF-8")]
    Utf8Label {
        /// Position of the label in the dictionary.
        index: usize,
    },
}

impl TagpackError {
    /// Wrap an I/O error with the stage and file it belongs to.
    pub fn io(stage: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TagpackError::Io {
            stage,
            path: path.into(),
            source,
        }
    }
}

impl From<candle_core::Error> for TagpackError {
    fn from(err: candle_core::Error) -> Self {
        TagpackError::Tensor(err.to_string())
    }
}

impl From<safetensors::SafeTensorError> for TagpackError {
    fn from(err: safetensors::SafeTensorError) -> Self {
        TagpackError::Model(err.to_string())
    }
}

/// Result type alias for tagpack operations.
pub type Result<T> = std::result::Result<T, TagpackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TagpackError::EmptyParameters;
        assert_eq!(err.to_string(), "model has no parameters");

        let err = TagpackError::InvalidParameter {
            name: "rnn.weight_hh_l0".into(),
            reason: "rank 3".into(),
        };
        assert!(err.to_string().contains("rnn.weight_hh_l0"));
    }

    #[test]
    fn io_error_names_stage_and_path() {
        let err = TagpackError::io(
            "write embedding table",
            "out/wnut17glove.emb",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("write embedding table"));
        assert!(msg.contains("wnut17glove.emb"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TagpackError>();
    }
}

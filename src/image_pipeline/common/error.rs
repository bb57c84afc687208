use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed Uview file: {0}")]
    FormatError(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatchError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid input path {}: {reason}", path.display())]
    PathError { path: PathBuf, reason: String },

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code for the command-line front end: 1 for a bad input
    /// argument, 2 for anything that failed while processing.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::PathError { .. } => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_errors_exit_with_one() {
        let err = PipelineError::path("/nope/img.dat", "does not exist");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("/nope/img.dat"));
    }

    #[test]
    fn test_processing_errors_exit_with_two() {
        assert_eq!(PipelineError::FormatError("short".into()).exit_code(), 2);
        assert_eq!(PipelineError::ConfigError("bad".into()).exit_code(), 2);
        assert_eq!(PipelineError::ShapeMismatchError("2x2 vs 3x3".into()).exit_code(), 2);
    }
}

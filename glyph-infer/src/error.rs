//! Error types for the backend executables

use std::path::PathBuf;
use thiserror::Error;

/// Backend errors
#[derive(Debug, Error)]
pub enum InferError {
    /// Model weights missing at startup
    #[error("model file not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Model file present but unusable
    #[error("failed to load model {}: {}", .path.display(), .message)]
    ModelLoad { path: PathBuf, message: String },

    /// Input tensor does not match what the model takes
    #[error("unexpected input shape {actual:?}, expected {expected}")]
    InputShape { actual: Vec<usize>, expected: String },

    /// Model produced fewer classes than the label map needs
    #[error("model returned {0} class scores")]
    EmptyOutput(usize),

    /// Predicted class has no entry in the label map
    #[error("unexpected label index: {0}")]
    LabelIndex(usize),

    /// ONNX Runtime failure
    #[error("ONNX Runtime error: {0}")]
    Runtime(#[from] ort::Error),

    /// Artifact decode failure
    #[error(transparent)]
    Common(#[from] glyph_common::Error),
}

/// Result type for backend operations
pub type InferResult<T> = Result<T, InferError>;

//! Backend kinds offered for inference
//!
//! Each kind is bound to a label map, a preprocessing variant and an
//! executable inference unit. The lowercase name is what clients see in the
//! ledger (`model_used` column) and what the endpoint paths are built from.

use serde::{Deserialize, Serialize};

/// Classifier families available for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Logistic regression over the flattened grid
    Lr,
    /// Convolutional network over the canonical glyph
    Cnn,
    /// Recurrent network over the canonical glyph, may report two candidates
    Rnn,
}

impl BackendKind {
    /// Ledger / wire representation ("lr", "cnn", "rnn")
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Lr => "lr",
            BackendKind::Cnn => "cnn",
            BackendKind::Rnn => "rnn",
        }
    }

    /// Human-readable name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Lr => "Logistic Regression",
            BackendKind::Cnn => "CNN",
            BackendKind::Rnn => "RNN",
        }
    }

    /// Default executable name of the backend
    pub fn executable_name(&self) -> &'static str {
        match self {
            BackendKind::Lr => "glyph-lr-infer",
            BackendKind::Cnn => "glyph-cnn-infer",
            BackendKind::Rnn => "glyph-rnn-infer",
        }
    }

    /// Environment variable naming the model weights for this backend
    pub fn model_env_var(&self) -> &'static str {
        match self {
            BackendKind::Lr => "GLYPH_LR_MODEL",
            BackendKind::Cnn => "GLYPH_CNN_MODEL",
            BackendKind::Rnn => "GLYPH_RNN_MODEL",
        }
    }

    /// Model weights path relative to a models directory
    pub fn default_model_file(&self) -> &'static str {
        match self {
            BackendKind::Lr => "lr/logreg.json",
            BackendKind::Cnn => "cnn/cnn.onnx",
            BackendKind::Rnn => "rnn/rnn.onnx",
        }
    }

    /// All backend kinds, in endpoint registration order
    pub fn all_variants() -> &'static [BackendKind] {
        &[BackendKind::Lr, BackendKind::Cnn, BackendKind::Rnn]
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! glyph-infer - model backend executables
//!
//! Each backend is a small program invoked once per request by the service:
//! it loads its model, preprocesses the artifact named by `--input`, and
//! prints exactly one line (the predicted label) on stdout. Diagnostics go to
//! stderr; any failure exits non-zero.

pub mod backend;
pub mod classifier;
pub mod cli;
pub mod error;
pub mod prediction;

pub use backend::Backend;
pub use classifier::{Classifier, LogisticRegression, OnnxClassifier};
pub use error::{InferError, InferResult};
pub use prediction::Prediction;

//! Model runtimes behind the backend executables
//!
//! A [`Classifier`] maps a preprocessed tensor to one score per class. The
//! logistic regression model is evaluated in-process from exported weights;
//! the networks run through ONNX Runtime.

use ndarray::{Array1, Array2};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use glyph_common::labels::CLASS_COUNT;
use glyph_common::{ModelInput, PIXEL_COUNT};

use crate::prediction::softmax;
use crate::{InferError, InferResult};

/// Anything that scores a preprocessed glyph
pub trait Classifier {
    /// One score per class, in the model's class order
    fn predict(&mut self, input: &ModelInput) -> InferResult<Vec<f32>>;
}

/// Weights exported from a fitted multinomial logistic regression
#[derive(Debug, Clone, Deserialize)]
struct LogisticRegressionFile {
    /// `n_classes x 784`
    coefficients: Vec<Vec<f32>>,
    /// `n_classes`
    intercepts: Vec<f32>,
    /// Class index of each row; defaults to `0..n_classes`
    #[serde(default)]
    classes: Option<Vec<usize>>,
}

/// Multinomial logistic regression over the flattened grid
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: Array2<f32>,
    intercepts: Array1<f32>,
    classes: Vec<usize>,
}

impl LogisticRegression {
    /// Load weights from a JSON file
    pub fn load(path: &Path) -> InferResult<Self> {
        if !path.exists() {
            return Err(InferError::ModelNotFound(path.to_path_buf()));
        }

        let load_error = |message: String| InferError::ModelLoad {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let file: LogisticRegressionFile =
            serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        Self::from_parts(file.coefficients, file.intercepts, file.classes).map_err(load_error)
    }

    /// Build a model from raw weights, checking every shape
    pub fn from_parts(
        coefficients: Vec<Vec<f32>>,
        intercepts: Vec<f32>,
        classes: Option<Vec<usize>>,
    ) -> Result<Self, String> {
        let n_classes = intercepts.len();
        if n_classes == 0 {
            return Err("model has no classes".to_string());
        }
        if coefficients.len() != n_classes {
            return Err(format!(
                "{} coefficient rows for {} intercepts",
                coefficients.len(),
                n_classes
            ));
        }
        if let Some(row) = coefficients.iter().position(|r| r.len() != PIXEL_COUNT) {
            return Err(format!(
                "coefficient row {} has {} features, expected {}",
                row,
                coefficients[row].len(),
                PIXEL_COUNT
            ));
        }

        let classes = classes.unwrap_or_else(|| (0..n_classes).collect());
        if classes.len() != n_classes {
            return Err(format!("{} class ids for {} classes", classes.len(), n_classes));
        }
        if let Some(&class) = classes.iter().find(|&&c| c >= CLASS_COUNT) {
            return Err(format!("class id {} outside 0..{}", class, CLASS_COUNT));
        }
        let mut seen = HashSet::with_capacity(n_classes);
        if let Some(&class) = classes.iter().find(|&&c| !seen.insert(c)) {
            return Err(format!("duplicate class id {}", class));
        }

        let flat: Vec<f32> = coefficients.into_iter().flatten().collect();
        let coefficients = Array2::from_shape_vec((n_classes, PIXEL_COUNT), flat)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            coefficients,
            intercepts: Array1::from_vec(intercepts),
            classes,
        })
    }
}

impl Classifier for LogisticRegression {
    fn predict(&mut self, input: &ModelInput) -> InferResult<Vec<f32>> {
        let ModelInput::Flat(features) = input else {
            return Err(InferError::InputShape {
                actual: input.shape().to_vec(),
                expected: format!("[1, {}]", PIXEL_COUNT),
            });
        };
        if features.shape() != [1, PIXEL_COUNT] {
            return Err(InferError::InputShape {
                actual: features.shape().to_vec(),
                expected: format!("[1, {}]", PIXEL_COUNT),
            });
        }

        let logits = (self.coefficients.dot(&features.row(0)) + &self.intercepts).to_vec();
        let probs = softmax(&logits);

        // Scatter into class-index order
        let n_out = self.classes.iter().copied().max().map_or(0, |m| m + 1);
        let mut scores = vec![0.0; n_out];
        for (row, &class) in self.classes.iter().enumerate() {
            scores[class] = probs[row];
        }
        Ok(scores)
    }
}

/// ONNX network taking a `(1, 28, 28, 1)` glyph tensor
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Create the ONNX Runtime session for a model file
    pub fn load(path: &Path) -> InferResult<Self> {
        if !path.exists() {
            return Err(InferError::ModelNotFound(path.to_path_buf()));
        }

        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .commit_from_file(path)
            .map_err(|e| InferError::ModelLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| InferError::ModelLoad {
                path: path.to_path_buf(),
                message: "model declares no inputs".to_string(),
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferError::ModelLoad {
                path: path.to_path_buf(),
                message: "model declares no outputs".to_string(),
            })?;

        tracing::debug!(
            model = %path.display(),
            input = %input_name,
            output = %output_name,
            "ONNX session ready"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }

}

impl Classifier for OnnxClassifier {
    fn predict(&mut self, input: &ModelInput) -> InferResult<Vec<f32>> {
        let ModelInput::Glyph(tensor) = input else {
            return Err(InferError::InputShape {
                actual: input.shape().to_vec(),
                expected: "[1, 28, 28, 1]".to_string(),
            });
        };

        let value = TensorRef::from_array_view(tensor.view())?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => value])?;
        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }
}

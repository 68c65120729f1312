//! A loaded backend: classifier + preprocessing + label map

use image::GrayImage;
use std::path::Path;
use tracing::info;

use glyph_common::{codec, BackendKind, Preprocessor};

use crate::prediction::{decide, Prediction};
use crate::{Classifier, InferResult, LogisticRegression, OnnxClassifier};

/// Inference unit for one backend kind
///
/// The model is loaded once in [`Backend::load`]; every classification
/// reuses it.
pub struct Backend {
    kind: BackendKind,
    classifier: Box<dyn Classifier>,
    preprocessor: Preprocessor,
    ambiguity_margin: Option<f32>,
}

impl Backend {
    /// Load the model for `kind` from `model_path`
    pub fn load(kind: BackendKind, model_path: &Path) -> InferResult<Self> {
        let classifier: Box<dyn Classifier> = match kind {
            BackendKind::Lr => Box::new(LogisticRegression::load(model_path)?),
            BackendKind::Cnn | BackendKind::Rnn => Box::new(OnnxClassifier::load(model_path)?),
        };
        info!("loaded {} model '{}'", kind.display_name(), model_path.display());

        Ok(Self::with_classifier(kind, classifier))
    }

    /// Wrap an already constructed classifier
    pub fn with_classifier(kind: BackendKind, classifier: Box<dyn Classifier>) -> Self {
        Self {
            kind,
            classifier,
            preprocessor: Preprocessor::for_backend(kind),
            ambiguity_margin: default_ambiguity_margin(kind),
        }
    }

    /// Report two candidates when their probabilities differ by less than `margin`
    pub fn with_ambiguity_margin(mut self, margin: Option<f32>) -> Self {
        self.ambiguity_margin = margin;
        self
    }

    pub fn classify(&mut self, image: &GrayImage) -> InferResult<Prediction> {
        let input = self.preprocessor.apply(image);
        let scores = self.classifier.predict(&input)?;
        decide(self.kind, &scores, self.ambiguity_margin)
    }

    /// Decode an artifact from disk and classify it
    pub fn classify_file(&mut self, path: &Path) -> InferResult<Prediction> {
        let image = codec::decode(path)?;
        self.classify(&image)
    }
}

/// The RNN reports its two best candidates; the other backends report one
pub fn default_ambiguity_margin(kind: BackendKind) -> Option<f32> {
    match kind {
        BackendKind::Rnn => Some(1.0),
        BackendKind::Lr | BackendKind::Cnn => None,
    }
}

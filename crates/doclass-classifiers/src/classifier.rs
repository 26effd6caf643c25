//! Document classifier and its load-once context

use crate::config::ClassifierConfig;
use crate::encoder::{EncodedInput, FeatureEncoder};
use crate::extractor::TextExtractor;
use crate::fusion::FusionScorer;
use crate::labels::LabelMap;
use crate::model_loader;
use crate::render::PageRasterizer;
use candle_core::{Device, Tensor, D};
use doclass_core::{ClassificationResult, Degradation, Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Classifies one PDF into one of the known categories
///
/// Holds only read-only state after construction, so a single instance can
/// be shared across threads behind an `Arc`.
pub struct DocumentClassifier {
    extractor: TextExtractor,
    rasterizer: PageRasterizer,
    encoder: FeatureEncoder,
    scorer: Arc<dyn FusionScorer>,
    labels: LabelMap,
}

impl DocumentClassifier {
    /// Assemble a classifier, checking that scorer and labels agree
    pub fn new(
        extractor: TextExtractor,
        rasterizer: PageRasterizer,
        encoder: FeatureEncoder,
        scorer: Arc<dyn FusionScorer>,
        labels: LabelMap,
    ) -> Result<Self> {
        if scorer.num_classes() != labels.len() {
            return Err(Error::model_load(format!(
                "{} produces {} logits but the label map has {} categories",
                scorer.name(),
                scorer.num_classes(),
                labels.len()
            )));
        }

        Ok(Self {
            extractor,
            rasterizer,
            encoder,
            scorer,
            labels,
        })
    }

    /// Known categories in index order
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Classify the document at `path`
    ///
    /// Extraction and rendering failures degrade to empty text and a blank
    /// page; only tensor preparation and the forward pass can fail here.
    pub fn classify(&self, path: &Path) -> Result<ClassificationResult> {
        let start = Instant::now();

        let extracted = self.extractor.extract_with_source(path);
        let page = self.rasterizer.rasterize_with_status(path);

        let degradation = Degradation {
            text_source: extracted.source,
            placeholder_image: page.placeholder,
        };

        let input = self.encoder.encode(&extracted.text, &page.image)?;
        let result = self.score(&input, degradation)?;

        debug!(
            "Classified {} in {}us",
            path.display(),
            start.elapsed().as_micros()
        );
        log_probabilities(&result);

        Ok(result)
    }

    /// Run the scorer on prepared input and build the result
    pub fn score(
        &self,
        input: &EncodedInput,
        degradation: Degradation,
    ) -> Result<ClassificationResult> {
        let logits = self.scorer.score(input)?;
        if logits.len() != self.labels.len() {
            return Err(Error::inference(format!(
                "expected {} logits, got {}",
                self.labels.len(),
                logits.len()
            )));
        }

        let probs = to_probabilities(&logits)?;
        build_result(&self.labels, &probs, degradation)
    }
}

/// Softmax over raw logits
pub fn to_probabilities(logits: &[f32]) -> Result<Vec<f32>> {
    let logits = Tensor::new(logits, &Device::Cpu)
        .map_err(|e| Error::inference(format!("Failed to create logits tensor: {}", e)))?;

    candle_nn::ops::softmax(&logits, D::Minus1)
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| Error::inference(format!("Softmax failed: {}", e)))
}

/// Turn per-index probabilities into a labelled result
///
/// The first index holding the maximum wins ties. Probabilities are reported
/// as percentages.
pub fn build_result(
    labels: &LabelMap,
    probs: &[f32],
    degradation: Degradation,
) -> Result<ClassificationResult> {
    if probs.iter().any(|p| !p.is_finite()) {
        return Err(Error::inference("model produced non-finite probabilities"));
    }

    let (best_idx, best_prob) = probs
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((idx, p)),
        })
        .ok_or_else(|| Error::inference("model produced no probabilities"))?;

    let predicted_class = labels
        .label(best_idx)
        .ok_or_else(|| Error::inference(format!("no label for index {}", best_idx)))?
        .to_string();

    let probabilities: BTreeMap<String, f64> = labels
        .iter()
        .zip(probs)
        .map(|((_, label), p)| (label.to_string(), f64::from(*p) * 100.0))
        .collect();

    Ok(ClassificationResult {
        predicted_class,
        confidence: f64::from(best_prob) * 100.0,
        probabilities,
        degradation,
    })
}

fn log_probabilities(result: &ClassificationResult) {
    info!(
        "Prediction: {} ({:.2}%)",
        result.predicted_class, result.confidence
    );
    for (label, prob) in result.ranked() {
        info!("  {:<24} {:>6.2}%", label, prob);
    }
}

/// Lifecycle of the process-wide classifier
enum ContextState {
    Ready(Arc<DocumentClassifier>),
    Unavailable { reason: String },
}

/// Load-once holder for the classifier
///
/// Built once at startup and never mutated; requests either get the shared
/// classifier or a [`Error::ModelNotLoaded`] naming the artifacts to provide.
pub struct ClassifierContext {
    state: ContextState,
    required_files: Vec<String>,
}

impl ClassifierContext {
    /// Load artifacts from configuration; failures leave the context not ready
    pub fn load(config: &ClassifierConfig) -> Self {
        let required_files = config.required_files();

        match model_loader::load_classifier(config) {
            Ok(classifier) => {
                info!("Model loaded successfully");
                Self::ready(classifier, required_files)
            }
            Err(e) => {
                error!("Error loading model: {}", e);
                Self::unavailable(required_files, e.to_string())
            }
        }
    }

    /// Context wrapping an already built classifier
    pub fn ready(classifier: DocumentClassifier, required_files: Vec<String>) -> Self {
        Self {
            state: ContextState::Ready(Arc::new(classifier)),
            required_files,
        }
    }

    /// Context that rejects every request
    pub fn unavailable(required_files: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            state: ContextState::Unavailable {
                reason: reason.into(),
            },
            required_files,
        }
    }

    /// Whether a classifier is available
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ContextState::Ready(_))
    }

    /// Why loading failed, if it did
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            ContextState::Ready(_) => None,
            ContextState::Unavailable { reason } => Some(reason),
        }
    }

    /// Artifact files the model needs
    pub fn required_files(&self) -> &[String] {
        &self.required_files
    }

    /// Shared classifier, or `ModelNotLoaded`
    pub fn classifier(&self) -> Result<Arc<DocumentClassifier>> {
        match &self.state {
            ContextState::Ready(classifier) => Ok(classifier.clone()),
            ContextState::Unavailable { .. } => {
                Err(Error::model_not_loaded(self.required_files.iter().cloned()))
            }
        }
    }

    /// Classify with the shared classifier
    pub fn classify(&self, path: &Path) -> Result<ClassificationResult> {
        self.classifier()?.classify(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doclass_core::TextSource;

    fn labels() -> LabelMap {
        LabelMap::from_labels(["invoice", "receipt", "resume"]).unwrap()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = to_probabilities(&[2.0, 1.0, 0.1]).unwrap();

        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_build_result_picks_argmax() {
        let result = build_result(&labels(), &[0.2, 0.7, 0.1], Degradation::none()).unwrap();

        assert_eq!(result.predicted_class, "receipt");
        assert!((result.confidence - 70.0).abs() < 1e-4);
        assert_eq!(result.probabilities.len(), 3);
        assert_eq!(result.probabilities["receipt"], result.confidence);
        assert!((result.probability_total() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_build_result_tie_goes_to_first_index() {
        let result = build_result(&labels(), &[0.4, 0.4, 0.2], Degradation::none()).unwrap();

        assert_eq!(result.predicted_class, "invoice");
    }

    #[test]
    fn test_build_result_rejects_nan() {
        let err = build_result(&labels(), &[f32::NAN, 0.5, 0.5], Degradation::none()).unwrap_err();

        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_build_result_keeps_degradation() {
        let degradation = Degradation {
            text_source: TextSource::Ocr,
            placeholder_image: true,
        };
        let result = build_result(&labels(), &[0.1, 0.1, 0.8], degradation).unwrap();

        assert_eq!(result.degradation, degradation);
        assert!(result.degradation.is_degraded());
    }

    #[test]
    fn test_failed_load_keeps_reason() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClassifierConfig {
            model_path: dir.path().join("hybrid_pdf_ocr_model.pt"),
            label_map_path: dir.path().join("label_map.json"),
            ..Default::default()
        };

        let context = ClassifierContext::load(&config);

        assert!(!context.is_ready());
        assert!(context
            .failure_reason()
            .unwrap()
            .contains("hybrid_pdf_ocr_model.pt"));
        assert_eq!(
            context.required_files(),
            &["hybrid_pdf_ocr_model.pt", "label_map.json"]
        );
    }

    #[test]
    fn test_unavailable_context() {
        let context = ClassifierContext::unavailable(
            vec!["hybrid_pdf_ocr_model.pt".to_string(), "label_map.json".to_string()],
            "weights missing",
        );

        assert!(!context.is_ready());
        assert_eq!(context.failure_reason(), Some("weights missing"));

        let err = context.classify(Path::new("doc.pdf")).unwrap_err();
        match err {
            Error::ModelNotLoaded { required_files } => {
                assert_eq!(required_files, vec!["hybrid_pdf_ocr_model.pt", "label_map.json"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_with_missing_artifacts_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClassifierConfig {
            model_path: dir.path().join("weights.pt"),
            label_map_path: dir.path().join("labels.json"),
            ..Default::default()
        };

        let context = ClassifierContext::load(&config);

        assert!(!context.is_ready());
        assert_eq!(context.required_files(), &["weights.pt", "labels.json"]);
    }
}

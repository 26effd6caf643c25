//! Classification result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the text fed to the model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// The document's embedded text layer
    TextLayer,
    /// OCR over the rendered first page
    Ocr,
    /// Extraction failed; the model saw an empty string
    None,
}

impl TextSource {
    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextLayer => "text_layer",
            Self::Ocr => "ocr",
            Self::None => "none",
        }
    }
}

/// Preprocessing fallbacks taken while classifying a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Source of the extracted text
    pub text_source: TextSource,

    /// True when the page image is the blank placeholder
    pub placeholder_image: bool,
}

impl Degradation {
    /// No fallback was taken on either branch
    pub fn none() -> Self {
        Self {
            text_source: TextSource::TextLayer,
            placeholder_image: false,
        }
    }

    /// True when either branch used its fallback
    pub fn is_degraded(&self) -> bool {
        self.text_source != TextSource::TextLayer || self.placeholder_image
    }
}

impl Default for Degradation {
    fn default() -> Self {
        Self::none()
    }
}

/// Result of classifying one document
///
/// Probabilities and confidence are percentages in `[0, 100]`. The mapping
/// holds one entry per known label; `confidence` is always the value stored
/// under `predicted_class`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Label with the highest probability
    pub predicted_class: String,

    /// Probability of the predicted label, as a percentage
    pub confidence: f64,

    /// Every known label mapped to its probability percentage
    pub probabilities: BTreeMap<String, f64>,

    /// Fallbacks taken during preprocessing
    #[serde(default)]
    pub degradation: Degradation,
}

impl ClassificationResult {
    /// Probabilities ordered from most to least likely
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .probabilities
            .iter()
            .map(|(label, prob)| (label.as_str(), *prob))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Sum of all probability percentages (~100)
    pub fn probability_total(&self) -> f64 {
        self.probabilities.values().sum()
    }
}

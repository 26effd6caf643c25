//! doclass classifiers
//!
//! Multi-modal PDF classification. A document goes through two independent
//! preprocessing branches before a single forward pass:
//!
//! - Text: the embedded text layer, or OCR of the first page when the text
//!   layer is too short
//! - Image: the first page rendered and resized to a square tensor
//!
//! Both branches degrade instead of failing (empty text, blank page), so a
//! loaded classifier always produces a result for a readable file path.
//! The fused DistilBERT + ResNet-18 network runs on Candle.

pub mod classifier;
pub mod config;
pub mod encoder;
pub mod extractor;
pub mod fusion;
pub mod labels;
pub mod model_loader;
pub mod ocr;
pub mod render;

pub use classifier::{build_result, to_probabilities, ClassifierContext, DocumentClassifier};
pub use config::{ClassifierConfig, DeviceSpec, OcrConfig, DEFAULT_LABEL_MAP_FILE, DEFAULT_MODEL_FILE};
pub use encoder::{EncodedInput, FeatureEncoder};
pub use extractor::{
    ExtractedText, ExtractionStrategy, PdfTextLayer, TextExtractor, TextLayer,
    DEFAULT_MIN_TEXT_CHARS,
};
pub use fusion::{FusionScorer, HybridModel};
pub use labels::LabelMap;
pub use model_loader::{build_wordpiece_tokenizer, load_classifier, load_tokenizer};
pub use ocr::{OcrEngine, TesseractCli};
pub use render::{blank_page, PageImage, PageRasterizer, PageRenderer, PdfiumRenderer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassifierContext, DocumentClassifier};
    pub use crate::config::ClassifierConfig;
    pub use crate::extractor::TextExtractor;
    pub use crate::fusion::FusionScorer;
    pub use crate::labels::LabelMap;
    pub use crate::render::PageRasterizer;
    pub use doclass_core::{ClassificationResult, Degradation, Error, Result, TextSource};
}

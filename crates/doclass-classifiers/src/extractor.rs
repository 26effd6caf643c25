//! Text extraction with OCR fallback
//!
//! Machine-generated PDFs carry a text layer that is cheap and exact to read.
//! Scanned PDFs carry little or none, so when the text layer comes back short
//! the first page is rendered, binarized, and run through OCR instead. Only the
//! first page is OCR'd to keep latency bounded.
//!
//! Extraction never fails from the caller's point of view: any error degrades
//! to an empty string.

use crate::ocr::{self, OcrEngine};
use crate::render::PageRenderer;
use doclass_core::{Error, Result, TextSource};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text-layer output must be longer than this to skip OCR
pub const DEFAULT_MIN_TEXT_CHARS: usize = 50;

/// Trait for programmatic text-layer extraction
pub trait TextLayer: Send + Sync {
    /// Extract the document's embedded text
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Text layer reader backed by `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextLayer;

impl TextLayer for PdfTextLayer {
    fn extract_text(&self, path: &Path) -> Result<String> {
        // pdf-extract panics on some malformed font dictionaries
        let outcome = std::panic::catch_unwind(|| pdf_extract::extract_text(path));

        match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::extraction(format!(
                "Failed to read text layer of {}: {}",
                path.display(),
                e
            ))),
            Err(_) => Err(Error::extraction(format!(
                "Text layer parser panicked on {}",
                path.display()
            ))),
        }
    }
}

/// Which extraction route a document takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The trimmed text layer is long enough to use as-is
    FastPath(String),
    /// The text layer is too short; OCR the first page
    OcrFallback,
}

impl ExtractionStrategy {
    /// Choose a route from raw text-layer output
    ///
    /// Length is counted in characters after trimming surrounding whitespace.
    pub fn select(raw: &str, min_chars: usize) -> Self {
        let trimmed = raw.trim();
        if trimmed.chars().count() > min_chars {
            Self::FastPath(trimmed.to_string())
        } else {
            Self::OcrFallback
        }
    }
}

/// Extracted text plus where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
}

impl ExtractedText {
    fn empty() -> Self {
        Self {
            text: String::new(),
            source: TextSource::None,
        }
    }
}

/// Produces best-effort plain text for a document
#[derive(Clone)]
pub struct TextExtractor {
    text_layer: Arc<dyn TextLayer>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrEngine>,
    dpi: u32,
    min_chars: usize,
}

impl TextExtractor {
    /// Create an extractor from its three backends
    pub fn new(
        text_layer: Arc<dyn TextLayer>,
        renderer: Arc<dyn PageRenderer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            text_layer,
            renderer,
            ocr,
            dpi: 150,
            min_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    /// Set the OCR render resolution
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the text-layer length threshold
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    /// Extract text, returning `""` on any failure
    pub fn extract(&self, path: &Path) -> String {
        self.extract_with_source(path).text
    }

    /// Extract text and report which route produced it
    pub fn extract_with_source(&self, path: &Path) -> ExtractedText {
        match self.try_extract(path) {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Failed to extract text from {}: {}", path.display(), e);
                ExtractedText::empty()
            }
        }
    }

    fn try_extract(&self, path: &Path) -> Result<ExtractedText> {
        let raw = self.text_layer.extract_text(path)?;

        match ExtractionStrategy::select(&raw, self.min_chars) {
            ExtractionStrategy::FastPath(text) => {
                info!("Extracted {} characters from text layer", text.chars().count());
                Ok(ExtractedText {
                    text,
                    source: TextSource::TextLayer,
                })
            }
            ExtractionStrategy::OcrFallback => {
                info!("Text layer insufficient, using OCR ({})", self.ocr.name());
                let text = self.ocr_first_page(path)?;
                info!("Extracted {} characters using OCR", text.chars().count());
                Ok(ExtractedText {
                    text,
                    source: TextSource::Ocr,
                })
            }
        }
    }

    fn ocr_first_page(&self, path: &Path) -> Result<String> {
        let page = self.renderer.render_first_page(path, self.dpi)?;
        let gray = page.to_luma8();
        let level = ocr::otsu_level(&gray);
        debug!("Otsu threshold for {}: {}", path.display(), level);

        let binary = ocr::binarize(&gray, level);
        let text = self.ocr.recognize(&binary)?;
        Ok(text.trim().to_string())
    }
}

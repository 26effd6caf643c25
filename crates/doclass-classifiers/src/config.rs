//! Configuration for the classification pipeline and model loading

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default weights artifact name
pub const DEFAULT_MODEL_FILE: &str = "hybrid_pdf_ocr_model.pt";

/// Default label map artifact name
pub const DEFAULT_LABEL_MAP_FILE: &str = "label_map.json";

/// Configuration for the document classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Fusion model weights (`.pt`/`.pth` state dict or `.safetensors`)
    pub model_path: PathBuf,

    /// Label map (`{label: index}` as JSON or YAML)
    pub label_map_path: PathBuf,

    /// Hugging Face repository providing the text encoder config and tokenizer
    pub text_model: String,

    /// Revision of `text_model`
    pub text_model_revision: String,

    /// Local directory with `config.json` and `tokenizer.json`/`vocab.txt`;
    /// takes precedence over `text_model`
    pub text_model_dir: Option<PathBuf>,

    /// Device to run inference on
    pub device: DeviceSpec,

    /// Token sequence length after padding/truncation
    pub max_length: usize,

    /// Square side of the image tensor and of the blank placeholder
    pub image_size: u32,

    /// Rendering resolution for the first page
    pub render_dpi: u32,

    /// Text-layer output must be longer than this many characters to skip OCR
    pub min_text_chars: usize,

    /// Directory holding the pdfium shared library; system library if unset
    pub pdfium_library_dir: Option<PathBuf>,

    /// OCR settings
    pub ocr: OcrConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            label_map_path: PathBuf::from(DEFAULT_LABEL_MAP_FILE),
            text_model: "distilbert-base-uncased".to_string(),
            text_model_revision: "main".to_string(),
            text_model_dir: None,
            device: DeviceSpec::Auto,
            max_length: 256,
            image_size: 224,
            render_dpi: 150,
            min_text_chars: 50,
            pdfium_library_dir: None,
            ocr: OcrConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// File names of the two artifacts that must exist for the model to load
    pub fn required_files(&self) -> Vec<String> {
        [&self.model_path, &self.label_map_path]
            .iter()
            .map(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            })
            .collect()
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract executable
    pub binary: PathBuf,

    /// Tesseract language pack
    pub language: String,

    /// Override for the tessdata directory
    pub datapath: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            datapath: None,
        }
    }
}

/// Device specification (for config files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// CUDA if available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda {
        index: Option<usize>,
    },
    Metal {
        index: Option<usize>,
    },
}

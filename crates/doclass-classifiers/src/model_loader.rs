//! Model loading: device selection, text encoder files, weights, and the
//! assembled [`DocumentClassifier`]

use crate::classifier::DocumentClassifier;
use crate::config::{ClassifierConfig, DeviceSpec};
use crate::encoder::FeatureEncoder;
use crate::extractor::{PdfTextLayer, TextExtractor};
use crate::fusion::HybridModel;
use crate::labels::LabelMap;
use crate::ocr::TesseractCli;
use crate::render::{PageRasterizer, PdfiumRenderer};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::distilbert::Config as DistilBertConfig;
use doclass_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Files describing the pretrained text encoder
#[derive(Debug, Clone)]
pub struct TextModelFiles {
    /// DistilBERT `config.json`
    pub config: PathBuf,
    /// `tokenizer.json` or a WordPiece `vocab.txt`
    pub tokenizer: PathBuf,
}

impl TextModelFiles {
    /// Locate the files in a local directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join("config.json");
        if !config.exists() {
            return Err(Error::model_load(format!(
                "config.json not found in {}",
                dir.display()
            )));
        }

        let tokenizer = ["tokenizer.json", "vocab.txt"]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                Error::model_load(format!(
                    "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
                    dir.display()
                ))
            })?;

        Ok(Self { config, tokenizer })
    }

    /// Download (or reuse cached) files from the Hugging Face Hub
    pub fn from_hub(repo_id: &str, revision: &str) -> Result<Self> {
        let api = Api::new()
            .map_err(|e| Error::model_load(format!("Failed to initialize HF API: {}", e)))?;

        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let config = repo.get("config.json").map_err(|e| {
            Error::model_load(format!("Failed to download config.json from {}: {}", repo_id, e))
        })?;

        let tokenizer = ["tokenizer.json", "vocab.txt"]
            .iter()
            .find_map(|name| repo.get(name).ok())
            .ok_or_else(|| {
                Error::model_load(format!(
                    "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
                    repo_id
                ))
            })?;

        Ok(Self { config, tokenizer })
    }

    /// Resolve from configuration; a local directory wins over the hub
    pub fn resolve(config: &ClassifierConfig) -> Result<Self> {
        match &config.text_model_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::from_hub(&config.text_model, &config.text_model_revision),
        }
    }
}

/// Create a Candle device from its specification
pub fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Auto => Device::cuda_if_available(0)
            .map_err(|e| Error::model_load(format!("Failed to select device: {}", e))),
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::model_load(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::model_load(format!("Failed to create Metal device: {}", e))),
    }
}

/// Human-readable device name for logs
pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

/// Load a tokenizer from `tokenizer.json` or a WordPiece `vocab.txt`
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let is_vocab = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("txt"));

    if is_vocab {
        debug!("Building tokenizer from {}", path.display());
        return build_wordpiece_tokenizer(path);
    }

    debug!("Loading tokenizer from {}", path.display());
    Tokenizer::from_file(path)
        .map_err(|e| Error::model_load(format!("Failed to load {}: {}", path.display(), e)))
}

/// Build a BERT-style uncased WordPiece tokenizer from a vocabulary file
pub fn build_wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::model_load(format!("Failed to build WordPiece model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

    let special = |token: &str| {
        tokenizer
            .token_to_id(token)
            .map(|id| (token.to_string(), id))
            .ok_or_else(|| {
                Error::model_load(format!(
                    "{} missing from vocabulary {}",
                    token,
                    vocab_path.display()
                ))
            })
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

    Ok(tokenizer)
}

/// Parse a DistilBERT config, returning it with its hidden width
pub fn load_text_config(path: &Path) -> Result<(DistilBertConfig, usize)> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        Error::model_load(format!("Failed to read config {}: {}", path.display(), e))
    })?;

    let config_json: serde_json::Value = serde_json::from_str(&config_str).map_err(|e| {
        Error::model_load(format!("Failed to parse config {}: {}", path.display(), e))
    })?;

    let hidden_size = config_json
        .get("dim")
        .or_else(|| config_json.get("hidden_size"))
        .and_then(|v| v.as_u64())
        .unwrap_or(768) as usize;

    let config: DistilBertConfig = serde_json::from_value(config_json).map_err(|e| {
        Error::model_load(format!("Failed to parse config {}: {}", path.display(), e))
    })?;

    Ok((config, hidden_size))
}

/// Open fusion weights; `.safetensors` is memory-mapped, anything else is
/// read as a PyTorch state dict
pub fn load_var_builder(weights_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    if !weights_path.exists() {
        return Err(Error::model_load(format!(
            "Model file not found: {}",
            weights_path.display()
        )));
    }

    let is_safetensors = weights_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("safetensors"));

    if is_safetensors {
        // SAFETY: the file is not modified while the mapping is alive
        unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| Error::model_load(format!("Failed to load SafeTensors: {}", e)))
        }
    } else {
        VarBuilder::from_pth(weights_path, DType::F32, device)
            .map_err(|e| Error::model_load(format!("Failed to load PyTorch weights: {}", e)))
    }
}

/// Load every artifact and assemble a ready classifier
///
/// Missing weights or label map yield [`Error::ModelNotLoaded`] naming both
/// files; other failures are [`Error::ModelLoad`].
pub fn load_classifier(config: &ClassifierConfig) -> Result<DocumentClassifier> {
    if !config.model_path.exists() || !config.label_map_path.exists() {
        return Err(Error::model_not_loaded(config.required_files()));
    }

    let labels = LabelMap::from_file(&config.label_map_path)?;
    info!("Loaded {} categories: {:?}", labels.len(), labels.labels());

    let device = create_device(config.device)?;
    info!("Using device: {}", device_name(&device));

    let text_files = TextModelFiles::resolve(config)?;
    let (text_config, text_dim) = load_text_config(&text_files.config)?;
    let tokenizer = load_tokenizer(&text_files.tokenizer)?;
    let encoder = FeatureEncoder::new(tokenizer, config.max_length, config.image_size)?;

    let vb = load_var_builder(&config.model_path, &device)?;
    let model = HybridModel::load(vb, &text_config, text_dim, labels.len())?;
    info!("Loaded fusion weights from {}", config.model_path.display());

    let renderer = Arc::new(match &config.pdfium_library_dir {
        Some(dir) => PdfiumRenderer::with_library_dir(dir),
        None => PdfiumRenderer::new(),
    });

    let extractor = TextExtractor::new(
        Arc::new(PdfTextLayer),
        renderer.clone(),
        Arc::new(TesseractCli::from_config(&config.ocr)),
    )
    .with_dpi(config.render_dpi)
    .with_min_chars(config.min_text_chars);

    let rasterizer = PageRasterizer::new(renderer, config.render_dpi, config.image_size);

    DocumentClassifier::new(extractor, rasterizer, encoder, Arc::new(model), labels)
}
